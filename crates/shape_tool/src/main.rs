use std::{fs::File, io, process, sync::Arc};

use backend_api::{BackendConnectionInfo, HttpRoutingService, HttpShapeStorage};
use model::{ShapeKey, TransitMode};
use shape_editor::{EditorError, EditorOptions, ShapeSession};

const USAGE: &str = "usage: shape_tool <feed> <shape> [snap <bus|rail|tram|ferry> | export [file]]";

#[derive(Debug, PartialEq)]
enum Action {
    Show,
    Snap(TransitMode),
    Export(Option<String>),
}

#[derive(Debug, PartialEq)]
struct Args {
    shape: ShapeKey,
    action: Action,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args, String> {
    let mut args = args.into_iter();
    let feed = args.next().ok_or("missing feed id")?;
    let feed_id = feed
        .parse::<i32>()
        .map_err(|_| format!("feed id is not a number: {feed}"))?;
    let shape_id = args.next().ok_or("missing shape id")?;
    let action = match args.next().as_deref() {
        None => Action::Show,
        Some("snap") => {
            let mode = args.next().ok_or("missing transit mode")?;
            Action::Snap(mode.parse().map_err(|e| format!("{e}"))?)
        }
        Some("export") => Action::Export(args.next()),
        Some(other) => return Err(format!("unknown command: {other}")),
    };
    if let Some(extra) = args.next() {
        return Err(format!("unexpected argument: {extra}"));
    }
    Ok(Args {
        shape: ShapeKey::new(feed_id, shape_id),
        action,
    })
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(why) => {
            eprintln!("{why}\n{USAGE}");
            process::exit(2);
        }
    };

    // backend
    let connection_info =
        BackendConnectionInfo::from_env().expect("expected backend connection info in env.");
    let storage =
        Arc::new(HttpShapeStorage::new(&connection_info).expect("could not build shape client."));
    let routing = Arc::new(
        HttpRoutingService::new(&connection_info).expect("could not build routing client."),
    );
    let mut session = ShapeSession::new(EditorOptions::default(), storage, Some(routing));

    if let Err(why) = run(&mut session, args).await {
        log::error!("{why}");
        process::exit(1);
    }
}

async fn run(
    session: &mut ShapeSession<HttpShapeStorage, HttpRoutingService>,
    args: Args,
) -> Result<(), EditorError> {
    let count = session.load(args.shape.clone()).await?;
    println!(
        "shape {}: {count} points, {:.0} m",
        args.shape,
        session.editor().length_meters()
    );

    match args.action {
        Action::Show => {
            let available = session.probe_routing().await;
            println!(
                "routing service {}",
                if available { "available" } else { "unavailable" }
            );
        }
        Action::Snap(mode) => {
            let summary = session.snap_to_road(mode).await?;
            if let Some(message) = &summary.message {
                log::info!("routing service: {message}");
            }
            let report = session.save().await?;
            println!(
                "snapped to {mode}: {} points, {:.0} m (confidence {}), saved at {}",
                report.point_count,
                summary.distance_meters,
                summary
                    .confidence
                    .map_or("n/a".to_owned(), |c| format!("{c:.2}")),
                report.saved_at.format("%H:%M:%S")
            );
        }
        Action::Export(path) => {
            let points = session.editor().point_set().to_shape_points();
            let shape_id = args.shape.shape_id.raw();
            let written = match &path {
                Some(path) => File::create(path)
                    .map_err(|e| EditorError::Transport(e.to_string()))
                    .and_then(|file| export(file, &shape_id, &points)),
                None => export(io::stdout().lock(), &shape_id, &points),
            };
            written?;
            if let Some(path) = path {
                println!("wrote {} rows to {path}", points.len());
            }
        }
    }
    Ok(())
}

fn export<W: io::Write>(
    writer: W,
    shape_id: &str,
    points: &[model::ShapePoint],
) -> Result<(), EditorError> {
    gtfs::write_shape(writer, shape_id, points).map_err(|e| EditorError::Transport(e.to_string()))
}
