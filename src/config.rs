use dotenvy::dotenv;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub service_name: String,
    pub database_url: String,
    pub redis_url: String,
    pub kafka_brokers: String,
    pub event_topic: String,
    pub jwt_secret: String,
    pub auth_service_url: String,
    pub risk_service_url: String,
    pub inventory_service_url: String,
    pub analytics_service_url: String,
    pub collaborator_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()?,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "gateway-core".to_string()),
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            kafka_brokers: env::var("KAFKA_BROKERS")
                .unwrap_or_else(|_| "localhost:9092".to_string()),
            event_topic: env::var("EVENT_TOPIC")
                .unwrap_or_else(|_| "transaction-events".to_string()),
            jwt_secret: env::var("JWT_SECRET")?,
            auth_service_url: env::var("AUTH_SERVICE_URL")
                .unwrap_or_else(|_| "http://auth-service:8084".to_string()),
            risk_service_url: env::var("RISK_SERVICE_URL")
                .unwrap_or_else(|_| "http://risk-service:8082".to_string()),
            inventory_service_url: env::var("INVENTORY_SERVICE_URL")
                .unwrap_or_else(|_| "http://inventory-service:8083".to_string()),
            analytics_service_url: env::var("ANALYTICS_SERVICE_URL")
                .unwrap_or_else(|_| "http://analytics-service:8081".to_string()),
            collaborator_timeout_secs: env::var("COLLABORATOR_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
        })
    }
}
