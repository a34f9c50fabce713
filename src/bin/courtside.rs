use std::path::PathBuf;

use anyhow::Context as _;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use courtside::{
    assets::{FsImageSource, ImageBank, InMemorySource},
    export::export_all,
    fetch::{GameProvider, GamesQuery, JsonFileProvider},
    fonts::FontLibrary,
    layout::compose_card,
    model::generate_cards,
    palette::derive_palette,
    store::{FsKvStore, MemKvStore, StyleStore},
    style::TextRole,
};

#[derive(Parser, Debug)]
#[command(name = "courtside", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compose result cards from a games JSON file and export them as PNG.
    Export(ExportArgs),
    /// Derive and print the text palette for a background image.
    Palette(PaletteArgs),
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Saved games API response (JSON).
    #[arg(long)]
    games: PathBuf,

    /// Directory with persisted card state. Defaults to a fresh session.
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Directory with .ttf/.otf fonts to register.
    #[arg(long)]
    fonts_dir: Option<PathBuf>,

    /// Local mirror of image URLs (path under the URL host maps to a file).
    #[arg(long)]
    assets_root: Option<PathBuf>,

    /// Output directory for PNG files.
    #[arg(long)]
    out_dir: PathBuf,

    /// Square output resolution in pixels.
    #[arg(long, default_value_t = 1080)]
    resolution: u32,

    /// Export only this card (1-based). All cards when omitted.
    #[arg(long)]
    card: Option<usize>,

    /// Only include games on or after this date (YYYY-MM-DD).
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Only include games on or before this date (YYYY-MM-DD).
    #[arg(long)]
    to: Option<NaiveDate>,
}

#[derive(Parser, Debug)]
struct PaletteArgs {
    /// Background image to analyze.
    #[arg(long)]
    image: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Export(args) => cmd_export(args),
        Command::Palette(args) => cmd_palette(args),
    }
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let provider = JsonFileProvider::new(&args.games);
    let query = GamesQuery {
        from: args.from.unwrap_or(NaiveDate::MIN),
        to: args.to.unwrap_or(NaiveDate::MAX),
        organization_id: 0,
    };
    let games = provider
        .fetch_games(&query)
        .with_context(|| format!("loading games from '{}'", args.games.display()))?;
    let cards = generate_cards(&games);
    if cards.is_empty() {
        anyhow::bail!("no games in '{}'", args.games.display());
    }

    let store = match &args.state_dir {
        Some(dir) => StyleStore::load(Box::new(FsKvStore::new(dir))),
        None => StyleStore::load(Box::new(MemKvStore::new())),
    };

    let mut fonts = FontLibrary::new();
    if let Some(dir) = &args.fonts_dir {
        let count = fonts
            .register_dir(dir)
            .with_context(|| format!("registering fonts from '{}'", dir.display()))?;
        anyhow::ensure!(count > 0, "no fonts found in '{}'", dir.display());
    }

    let mut bank = match &args.assets_root {
        Some(root) => ImageBank::new(Box::new(FsImageSource::new(root))),
        None => ImageBank::new(Box::new(InMemorySource::new())),
    };

    let styles = store.resolved_styles();
    let selected: Vec<usize> = match args.card {
        Some(n) => {
            anyhow::ensure!(
                (1..=cards.len()).contains(&n),
                "card {n} out of range, have {} cards",
                cards.len()
            );
            vec![n - 1]
        }
        None => (0..cards.len()).collect(),
    };

    let scenes: Vec<_> = selected
        .iter()
        .map(|&i| {
            compose_card(
                &cards[i],
                &styles,
                store.logos(),
                store.selected_background(),
                store.text_elements(),
                &mut bank,
            )
        })
        .collect();

    let exported = export_all(&scenes, &mut fonts, &args.out_dir, args.resolution)?;
    for card in &exported {
        println!("{}", card.path.display());
    }
    Ok(())
}

fn cmd_palette(args: PaletteArgs) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.image)
        .with_context(|| format!("reading image '{}'", args.image.display()))?;
    let palette = derive_palette(&bytes);
    for role in TextRole::ALL {
        println!("{role:?}: {}", palette.role(role));
    }
    Ok(())
}
