use chrono::{Duration, SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};

use edge_gateway::security::SecretKey;

#[derive(Parser)]
#[command(name = "gatewayctl")]
#[command(about = "Operator tooling for the edge gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an Ed25519 key pair (hex)
    Keygen,
    /// Mint a v4.public bearer token
    Mint {
        /// Hex-encoded 32-byte secret key
        #[arg(long, env = "GATEWAY_SECRET_KEY")]
        secret_key: String,

        #[arg(long)]
        user_id: Option<String>,

        #[arg(long)]
        admin: bool,

        #[arg(long)]
        session_id: Option<String>,

        /// Arbitrary JSON forwarded as X-Custom-Claims
        #[arg(long)]
        custom_claims: Option<String>,

        /// Lifetime in seconds; 0 mints a token without `exp`
        #[arg(long, default_value_t = 3600)]
        ttl_secs: i64,
    },
    /// Check a gateway's health endpoint
    Health {
        #[arg(short, long, default_value = "http://localhost:8080")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen => {
            let secret = SecretKey::generate();
            println!("secret_key = \"{}\"", secret.to_hex());
            println!("public_key_hex = \"{}\"", secret.public_key().to_hex());
        }
        Commands::Mint {
            secret_key,
            user_id,
            admin,
            session_id,
            custom_claims,
            ttl_secs,
        } => {
            let secret = SecretKey::from_hex(&secret_key)?;
            let now = Utc::now();

            let mut claims = Map::new();
            claims.insert("isAdmin".into(), json!(admin));
            claims.insert("iat".into(), json!(now.to_rfc3339_opts(SecondsFormat::Secs, true)));
            if let Some(user_id) = user_id {
                claims.insert("userId".into(), json!(user_id));
            }
            if let Some(session_id) = session_id {
                claims.insert("sessionId".into(), json!(session_id));
            }
            if let Some(raw) = custom_claims {
                let value: Value = serde_json::from_str(&raw)?;
                claims.insert("customClaims".into(), value);
            }
            if ttl_secs > 0 {
                let exp = now + Duration::seconds(ttl_secs);
                claims.insert("exp".into(), json!(exp.to_rfc3339_opts(SecondsFormat::Secs, true)));
            }

            let payload = serde_json::to_vec(&Value::Object(claims))?;
            println!("{}", secret.sign(&payload, b""));
        }
        Commands::Health { url } => {
            let res = reqwest::get(format!("{}/health", url.trim_end_matches('/'))).await?;
            let status = res.status();
            if !status.is_success() {
                eprintln!("Error: gateway returned status {}", status);
                if let Ok(text) = res.text().await {
                    eprintln!("Response: {}", text);
                }
                std::process::exit(1);
            }

            let json: Value = res.json().await?;
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    Ok(())
}
