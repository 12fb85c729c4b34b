//! mdpro: command-line client for the mdpro Markdown editor.
//!
//! The signed-in session is kept in `MDPRO_SESSION_FILE` between runs.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use mdpro_client::{
    parse_expiry, parse_share_token, qr_svg, qr_terminal, render_markdown, Backend, ClientConfig,
    DocumentSession, HttpBackend, Navigator, NotificationQueue, ShareClient, ShareOptions,
    UserContext,
};
use mdpro_core::{tree::TreeNode, Credentials, Session, ShareResolution};

#[derive(Parser)]
#[command(name = "mdpro")]
#[command(author, version, about = "Markdown editor client for mdpro")]
#[command(propagate_version = true)]
struct Cli {
    /// API base URL (overrides MDPRO_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Signup {
        #[arg(short, long)]
        email: String,

        /// At least 6 characters
        #[arg(short, long, env = "MDPRO_PASSWORD")]
        password: String,
    },

    /// Sign in with e-mail and password
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "MDPRO_PASSWORD")]
        password: String,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Print the category/document tree
    Tree,

    /// Print a document's Markdown
    Show { id: Uuid },

    /// Print a document rendered as HTML
    Render { id: Uuid },

    /// Create an untitled document
    New,

    /// Create a category
    NewCategory {
        name: String,

        /// Parent category id
        #[arg(long)]
        parent: Option<Uuid>,
    },

    /// Rename a document
    Title { id: Uuid, title: String },

    /// Replace a document's content with a file ("-" reads stdin)
    Write { id: Uuid, file: PathBuf },

    /// Create a share link for a document
    Share {
        id: Uuid,

        /// Readable without the password
        #[arg(long)]
        public: bool,

        /// Password visitors must enter
        #[arg(long)]
        password: Option<String>,

        /// Expiry as RFC 3339 or a duration such as 12h or 7d
        #[arg(long)]
        expires: Option<String>,

        /// Also print the link as a QR code
        #[arg(long)]
        qr: bool,

        /// Write the QR code as SVG to this file
        #[arg(long, value_name = "FILE")]
        qr_svg: Option<PathBuf>,
    },

    /// Open a share link or token
    OpenShare {
        link: String,

        #[arg(long)]
        password: Option<String>,
    },

    /// Change the password
    Passwd {
        #[arg(short, long, env = "MDPRO_NEW_PASSWORD")]
        password: String,

        /// Repeat the new password
        #[arg(short, long)]
        confirm: String,
    },

    /// Request a password recovery token
    Recover { email: String },

    /// Redeem a recovery token and set a new password
    Reset {
        token: String,

        #[arg(short, long, env = "MDPRO_NEW_PASSWORD")]
        password: String,
    },

    /// Print the tree again whenever documents or categories change
    Watch,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn load_session(path: &Path) -> Option<Session> {
    let raw = tokio::fs::read_to_string(path).await.ok()?;
    serde_json::from_str(&raw).ok()
}

async fn save_session(path: &Path, session: &Session) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    let json = serde_json::to_string_pretty(session)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write session to {}", path.display()))
}

fn print_notifications(queue: &NotificationQueue) {
    for notification in queue.drain() {
        eprintln!("{}", notification);
    }
}

fn print_tree(nav: &Navigator) {
    for row in nav.visible_rows() {
        let indent = "  ".repeat(row.depth);
        match row.node {
            TreeNode::Category { category, .. } => println!("{}{}/", indent, category.name),
            TreeNode::Document { document } => {
                println!("{}{}  [{}]", indent, document.display_title(), document.id)
            }
        }
    }
}

async fn read_input(file: &Path) -> anyhow::Result<String> {
    if file == Path::new("-") {
        use tokio::io::AsyncReadExt;
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        return Ok(buf);
    }
    tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ClientConfig::from_env();
    if let Some(url) = cli.api_url {
        config = config.with_api_url(url);
    }

    let http = HttpBackend::new(&config)?;
    if config.access_token.is_none() {
        if let Some(session) = load_session(&config.session_file).await {
            http.restore(session).await;
        }
    }
    let backend: Arc<dyn Backend> = Arc::new(http);
    let queue = NotificationQueue::new();
    let notifier = Arc::new(queue.clone());

    let result = dispatch(cli.command, &config, backend, notifier).await;
    print_notifications(&queue);
    result
}

async fn dispatch(
    command: Commands,
    config: &ClientConfig,
    backend: Arc<dyn Backend>,
    notifier: Arc<NotificationQueue>,
) -> anyhow::Result<()> {
    match command {
        Commands::Signup { email, password } => {
            let session = backend.sign_up(Credentials::new(email, password)).await?;
            save_session(&config.session_file, &session).await?;
            println!("Signed up as {}", session.user.email);
        }
        Commands::Login { email, password } => {
            let session = backend.sign_in(Credentials::new(email, password)).await?;
            save_session(&config.session_file, &session).await?;
            println!("Signed in as {}", session.user.email);
        }
        Commands::Logout => {
            let result = backend.sign_out().await;
            if tokio::fs::try_exists(&config.session_file).await? {
                tokio::fs::remove_file(&config.session_file).await?;
            }
            result?;
            println!("Signed out");
        }
        Commands::Whoami => {
            let Some(user) = backend.current_user().await? else {
                bail!("not signed in");
            };
            let ctx = UserContext::init(backend, notifier).await;
            let name = ctx.display_name().await.unwrap_or_else(|| user.email.clone());
            println!("{} <{}>", name, user.email);
            if ctx.recovery_pending().await {
                println!("Password reset pending: run `mdpro passwd`");
            }
        }
        Commands::Tree => {
            let mut nav = Navigator::new(backend, notifier);
            if !nav.refresh().await {
                bail!("could not load documents");
            }
            nav.expand_all();
            print_tree(&nav);
        }
        Commands::Show { id } => {
            let mut session = DocumentSession::new(backend, notifier);
            let doc = session.open(id).await?;
            println!("{}", doc.content);
        }
        Commands::Render { id } => {
            let mut session = DocumentSession::new(backend, notifier);
            let doc = session.open(id).await?;
            println!("{}", render_markdown(&doc.content));
        }
        Commands::New => {
            let mut nav = Navigator::new(backend, notifier);
            let Some(doc) = nav.create_document().await else {
                bail!("could not create document");
            };
            println!("{}", doc.id);
        }
        Commands::NewCategory { name, parent } => {
            let mut nav = Navigator::new(backend, notifier);
            let Some(category) = nav.create_category(&name, parent).await else {
                bail!("could not create category");
            };
            println!("{}  {}", category.id, category.path);
        }
        Commands::Title { id, title } => {
            let mut session = DocumentSession::new(backend, notifier);
            session.open(id).await?;
            session.begin_title_edit();
            session.set_title_draft(title);
            if !session.confirm_title().await {
                bail!("title not saved");
            }
        }
        Commands::Write { id, file } => {
            let content = read_input(&file).await?;
            let mut session = DocumentSession::new(backend, notifier);
            session.open(id).await?;
            if !session.edit_content(content).await {
                bail!("content not saved");
            }
        }
        Commands::Share {
            id,
            public,
            password,
            expires,
            qr,
            qr_svg: svg_path,
        } => {
            let expiry_date = expires
                .map(|e| parse_expiry(&e, chrono::Utc::now()))
                .transpose()?;
            let client = ShareClient::new(backend, config.public_url.clone());
            let link = client
                .create_share(
                    id,
                    ShareOptions {
                        is_public: public,
                        password,
                        expiry_date,
                    },
                )
                .await?;
            println!("{}", link.url);
            if qr {
                println!("{}", qr_terminal(&link.url)?);
            }
            if let Some(path) = svg_path {
                tokio::fs::write(&path, qr_svg(&link.url)?)
                    .await
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("QR code written to {}", path.display());
            }
        }
        Commands::OpenShare { link, password } => {
            let Some(token) = parse_share_token(&link) else {
                bail!("not a share link: {}", link);
            };
            let client = ShareClient::new(backend, config.public_url.clone());
            let resolution = match password.as_deref() {
                Some(password) => client.unlock(&token, password).await?,
                None => client.open(&token).await?,
            };
            match resolution {
                ShareResolution::Document(doc) => {
                    println!("# {}\n\n{}", doc.title, doc.content);
                }
                other => bail!(other.message().unwrap_or("share unavailable")),
            }
        }
        Commands::Passwd { password, confirm } => {
            let ctx = UserContext::init(backend, notifier).await;
            ctx.change_password(&password, &confirm).await?;
        }
        Commands::Recover { email } => {
            backend.request_recovery(&email).await?;
            println!("If the account exists, a recovery token has been issued");
        }
        Commands::Reset { token, password } => {
            backend.verify_recovery(&token).await?;
            backend.update_user_password(&password).await?;
            let Some(session) = backend.session().await else {
                bail!("session lost after password reset");
            };
            save_session(&config.session_file, &session).await?;
            println!("Password updated for {}", session.user.email);
        }
        Commands::Watch => {
            let mut nav = Navigator::new(backend, notifier.clone());
            let mut watch = nav.watch().await?;
            nav.refresh().await;
            nav.expand_all();
            print_tree(&nav);

            loop {
                tokio::select! {
                    batch = nav.follow(&mut watch) => {
                        let Some(changes) = batch else { break };
                        nav.expand_all();
                        println!("--- {} change(s)", changes);
                        print_tree(&nav);
                        print_notifications(&notifier);
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
    }
    Ok(())
}
