use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use portfolio_tracker::auth::ttl_from_minutes;
use portfolio_tracker::config::{ALGORITHM_VAR, EXPIRATION_VAR, SECRET_KEY_VAR};
use portfolio_tracker::{
    AuthConfig, DatabaseConfig, TokenIssuer, TokenVerifier, create_auth_service,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "portfolio-tracker")]
#[command(about = "Stock portfolio tracker: authentication and session tokens")]
struct Cli {
    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty, global = true)]
    log_format: LogFormat,

    #[command(flatten)]
    auth: AuthArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

/// Token signing settings. Each flag falls back to its environment variable.
#[derive(Args)]
struct AuthArgs {
    /// Symmetric signing key
    #[arg(long, env = "SECRET_KEY", hide_env_values = true, global = true)]
    secret_key: Option<String>,
    /// Signing algorithm (HS256, HS384 or HS512)
    #[arg(long, env = "ALGORITHM", global = true)]
    algorithm: Option<String>,
    /// Default token lifetime in minutes
    #[arg(long, env = "JWT_EXPIRATION_TIME", global = true)]
    jwt_expiration_time: Option<String>,
}

impl AuthArgs {
    /// Build the process-wide auth config. Errors here are fatal.
    fn load(&self) -> Result<AuthConfig> {
        let config = AuthConfig::from_lookup(|key| match key {
            SECRET_KEY_VAR => self.secret_key.clone(),
            ALGORITHM_VAR => self.algorithm.clone(),
            EXPIRATION_VAR => self.jwt_expiration_time.clone(),
            _ => None,
        })?;
        info!(
            "Auth configured: algorithm={:?}, default expiry={} minutes",
            config.algorithm(),
            config.default_expiry_minutes()
        );
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema
    Init {
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
    },
    /// Register a new user
    Register {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PORTFOLIO_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
    },
    /// Log in and print an access token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "PORTFOLIO_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
    },
    /// Resolve an access token to its user
    Whoami {
        #[arg(long)]
        token: String,
        #[arg(long, env = "SURREALDB_URL", default_value = "memory")]
        db_url: String,
    },
    /// Issue a token for a subject without touching the database
    IssueToken {
        #[arg(long)]
        subject: String,
        /// Lifetime in minutes (defaults to JWT_EXPIRATION_TIME)
        #[arg(long, allow_hyphen_values = true)]
        ttl_minutes: Option<i64>,
    },
    /// Verify a token and print its subject
    VerifyToken {
        #[arg(long)]
        token: String,
    },
    /// Print the Argon2 hash of a password
    HashPassword {
        #[arg(long, env = "PORTFOLIO_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("portfolio_tracker=info".parse()?)
        .add_directive("surrealdb=warn".parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}

fn db_config(db_url: String) -> DatabaseConfig {
    DatabaseConfig {
        url: db_url,
        ..Default::default()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    match cli.command {
        Commands::Init { db_url } => {
            let db_config = db_config(db_url);
            info!("Using database url for initialization: {}", db_config.url);

            let db = portfolio_tracker::create_connection(db_config).await?;
            portfolio_tracker::ensure_schema(&db).await?;
            info!("Database initialized successfully");
        }
        Commands::Register {
            email,
            password,
            db_url,
        } => {
            let auth_config = cli.auth.load()?;
            let service = create_auth_service(&auth_config, db_config(db_url)).await?;

            let user = service.register(&email, &password).await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Commands::Login {
            email,
            password,
            db_url,
        } => {
            let auth_config = cli.auth.load()?;
            let service = create_auth_service(&auth_config, db_config(db_url)).await?;

            let token = service.login(&email, &password).await?;
            println!("{}", serde_json::to_string_pretty(&token)?);
        }
        Commands::Whoami { token, db_url } => {
            let auth_config = cli.auth.load()?;
            let service = create_auth_service(&auth_config, db_config(db_url)).await?;

            let user = service.resolve(&token).await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Commands::IssueToken {
            subject,
            ttl_minutes,
        } => {
            let auth_config = cli.auth.load()?;
            let issuer = TokenIssuer::new(&auth_config);

            let ttl = ttl_minutes.map(ttl_from_minutes).transpose()?;
            let token = issuer.issue(&subject, ttl)?;
            println!("{}", token);
        }
        Commands::VerifyToken { token } => {
            let auth_config = cli.auth.load()?;
            let verifier = TokenVerifier::new(&auth_config);

            let subject = verifier.verify(&token)?;
            println!("{}", subject);
        }
        Commands::HashPassword { password } => {
            let hash = portfolio_tracker::auth::hash_password(&password)?;
            println!("{}", hash);
        }
    }

    Ok(())
}
