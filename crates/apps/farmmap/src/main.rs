mod config;

use std::error::Error;
use std::sync::Arc;

use api::{ApiClient, FileTokenStore, HttpTransport, LoginRequest, RecordId, RegisterRequest};
use clap::{Parser, Subcommand};
use foundation::math::{GeoCoord, mean_coord};
use globe::{CameraView, SharedViewer, ViewerLease, ViewerOptions};
use runtime::CancelToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use workflow::{
    AnalysisOrchestrator, ChatSession, DashboardSummary, FarmForm, FarmSubmission,
    FixedGeolocator, LatestPanel, LocateFlow, PolygonCapture, ResultsRoute, ResultsView,
};

use crate::config::{Config, parse_lat_lon};

#[derive(Parser, Debug)]
#[command(author, version, about = "Draw farm boundaries and request AI farm analyses")]
struct Args {
    /// Backend base URL (overrides FARMMAP_API_BASE_URL)
    #[arg(long)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the token pair
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },

    /// Create an account (sign in separately afterwards)
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        password_confirm: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "en")]
        language: String,
    },

    /// Forget the stored tokens
    Logout,

    /// List your farms
    Farms,

    /// Draw a farm boundary, save it and play the analysis sequence
    Create {
        /// Farm name
        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Boundary vertex as LAT,LON; repeat at least three times
        #[arg(long = "point", value_parser = parse_lat_lon, required = true)]
        points: Vec<GeoCoord>,

        /// Open the results view once the sequence finishes
        #[arg(long)]
        open: bool,
    },

    /// Run a new analysis for a farm
    Analyze { farm_id: String },

    /// Show a farm and its analysis history
    Results { farm_id: String },

    /// Ask the assistant a question
    Chat {
        /// Farm the question is about
        #[arg(long)]
        farm: Option<String>,

        /// Continue an existing conversation
        #[arg(long)]
        conversation: Option<String>,

        #[arg(required = true)]
        message: Vec<String>,
    },

    /// Print the messages of a conversation
    History { conversation_id: String },

    /// Fly the globe to the configured current location
    Locate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(url) = args.api_url {
        config.api_base_url = url;
    }

    let transport = HttpTransport::new(config.api_base_url.clone(), config.http_timeout)?;
    let tokens = FileTokenStore::new(config.token_file.clone());
    let client = ApiClient::new(Arc::new(transport), Arc::new(tokens));

    let result = run(args.command, &config, &client).await;
    if let Err(err) = &result {
        error!(error = %err, "command failed");
    }
    result
}

async fn run(command: Command, config: &Config, client: &ApiClient) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Login { username, password } => {
            let auth = client
                .login(&LoginRequest { username, password })
                .await
                .map_err(|err| err.user_message("Login failed"))?;
            println!("Signed in as {}", auth.user.username);
        }
        Command::Register {
            username,
            email,
            password,
            password_confirm,
            phone,
            language,
        } => {
            let account = RegisterRequest {
                username,
                email,
                password,
                password_confirm,
                phone,
                language,
            };
            account.validate()?;
            client
                .register(&account)
                .await
                .map_err(|err| err.user_message("Registration failed"))?;
            println!("Account created for {}. Sign in with `farmmap login`.", account.username);
        }
        Command::Logout => {
            client.logout()?;
            println!("Signed out");
        }
        Command::Farms => {
            let summary = DashboardSummary::load(client).await?;
            if let Some(hint) = summary.hint() {
                println!("{hint}");
            }
            for farm in &summary.farms {
                match farm.area_m2 {
                    Some(area) => println!("{:>6}  {}  ({:.1} ha)", farm.id, farm.name, area / 10_000.0),
                    None => println!("{:>6}  {}", farm.id, farm.name),
                }
            }
            println!("{} farm(s)", summary.farm_count());
        }
        Command::Create {
            name,
            description,
            points,
            open,
        } => create(config, client, name, description, points, open).await?,
        Command::Analyze { farm_id } => {
            let analysis = client
                .analyze_farm(&RecordId::new(farm_id))
                .await
                .map_err(|err| err.user_message(workflow::ANALYSIS_FAILED_MESSAGE))?;
            println!(
                "Analysis {}: {}",
                analysis.id,
                analysis.effective_status().label()
            );
            println!("{}", serde_json::to_string_pretty(&analysis.raw_llm_response)?);
        }
        Command::Results { farm_id } => {
            let view = ResultsView::open(client, ResultsRoute::by_id(RecordId::new(farm_id))).await?;
            print_results(&view)?;
        }
        Command::Chat {
            farm,
            conversation,
            message,
        } => {
            let mut session = match conversation {
                Some(id) => ChatSession::resume(client.clone(), id),
                None => ChatSession::new(client.clone(), farm.map(RecordId::new)),
            };
            let reply = session.send(&message.join(" ")).await?.to_string();
            println!("{reply}");
            if let Some(id) = session.conversation_id() {
                println!("(conversation {id})");
            }
        }
        Command::History { conversation_id } => {
            let history = ChatSession::resume(client.clone(), conversation_id)
                .history()
                .await?;
            for message in &history.messages {
                println!("[{:?}] {}", message.role, message.content);
            }
        }
        Command::Locate => {
            let mut lease = ViewerLease::acquire(ViewerOptions::default());
            lease.start_render_loop(config.orchestrator().frames_per_second);
            let flow = LocateFlow::new(
                Arc::new(lease.viewer()),
                Arc::new(FixedGeolocator::new(config.home)),
            );
            let coord = flow.locate_and_fly(&CancelToken::new()).await?;
            println!("Located at {:.6}, {:.6}", coord.lat, coord.lon);
            lease.release();
        }
    }
    Ok(())
}

async fn create(
    config: &Config,
    client: &ApiClient,
    name: String,
    description: String,
    points: Vec<GeoCoord>,
    open: bool,
) -> Result<(), Box<dyn Error>> {
    let mut lease = ViewerLease::acquire(ViewerOptions::default());
    let viewer = lease.viewer();

    let coords = draw_boundary(&viewer, config, &points)?;
    info!(count = coords.len(), "boundary confirmed");

    let mut form = FarmForm { name, description };
    let farm = FarmSubmission::new(client.clone())
        .submit(&mut form, &coords)
        .await?;
    println!("Created farm {} ({})", farm.name, farm.id);

    let orchestrator_config = config.orchestrator();
    lease.start_render_loop(orchestrator_config.frames_per_second);
    let orchestrator = AnalysisOrchestrator::new(Arc::new(viewer), orchestrator_config);
    let report = orchestrator.start(client, farm, coords).await?;
    for stage in &report.stages {
        println!(
            "  {:<14} {:<11} {:>6.2}s",
            stage.stage.name(),
            stage.outcome.name(),
            stage.elapsed.as_secs_f64()
        );
    }
    println!("[{}]", report.action.label());
    lease.release();

    if open {
        let view = ResultsView::open(client, report.action.trigger()).await?;
        print_results(&view)?;
    }
    Ok(())
}

/// Clicks each vertex on the headless globe, then closes and confirms the ring.
fn draw_boundary(
    viewer: &SharedViewer,
    config: &Config,
    points: &[GeoCoord],
) -> Result<Vec<GeoCoord>, Box<dyn Error>> {
    let center = mean_coord(points).ok_or("no boundary points")?;
    let spread_m = points
        .iter()
        .map(|p| p.to_ecef(0.0).distance(center.to_ecef(0.0)))
        .fold(0.0_f64, f64::max);

    let mut viewer = viewer.lock();
    viewer
        .camera_mut()
        .set_view(CameraView::looking_down_at(center, (spread_m * 4.0).max(2_000.0)));

    let mut capture = PolygonCapture::new(config.ring_order.strategy());
    capture.start_drawing(&mut *viewer)?;
    for point in points {
        let ecef = point.to_ecef(0.0);
        let screen = viewer.camera().project(ecef);
        let hit = screen.and_then(|screen| capture.click(&mut *viewer, screen));
        if hit.is_none() {
            warn!(lat = point.lat, lon = point.lon, "vertex off screen; adding directly");
            capture.point_picked(&mut *viewer, ecef)?;
        }
    }
    capture.complete(&mut *viewer)?;
    Ok(capture.confirm()?)
}

fn print_results(view: &ResultsView) -> Result<(), Box<dyn Error>> {
    let farm = view.farm();
    println!("{} ({})", farm.name, farm.id);
    if let Some(err) = view.error() {
        println!("! {err}");
    }
    match view.latest_panel() {
        LatestPanel::NoAnalysis => println!("No analysis yet"),
        LatestPanel::InProgress => println!("Latest analysis: in progress"),
        LatestPanel::Failed => println!("Latest analysis: failed"),
        LatestPanel::Completed(results) => {
            println!("Latest analysis:");
            println!("{}", serde_json::to_string_pretty(results)?);
        }
    }
    for analysis in view.analyses() {
        println!(
            "  {:>6}  {:<9}  {}",
            analysis.id,
            analysis.effective_status().label(),
            analysis.created_at.to_rfc3339()
        );
    }
    Ok(())
}
