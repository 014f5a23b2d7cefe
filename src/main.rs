use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "photo-translator-rust",
    version,
    about = "Translate text found in photos using OCR and LLM tool calls"
)]
struct Cli {
    /// Photo to translate (png/jpeg/webp/...)
    image: Option<String>,

    /// Target language (default: en)
    #[arg(short = 'l', long = "lang", default_value = "en")]
    lang: String,

    /// Output path (default: <image>-translated.png)
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Model name (e.g. gpt-4o-mini)
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// API key (overrides OPENAI_API_KEY)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Font file for the translated overlay
    #[arg(long = "font")]
    font: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Show supported target languages and exit
    #[arg(long = "list-languages")]
    list_languages: bool,

    /// Write detection overlay and raw observations next to the image
    #[arg(long = "debug-boxes")]
    debug_boxes: bool,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    photo_translator_rust::logging::init(cli.verbose)?;

    let output = photo_translator_rust::run(
        photo_translator_rust::Config {
            lang: cli.lang,
            output: cli.output,
            model: cli.model,
            key: cli.key,
            font: cli.font,
            settings_path: cli.read_settings,
            list_languages: cli.list_languages,
            debug_boxes: cli.debug_boxes,
        },
        cli.image,
    )
    .await?;

    println!("{}", output);
    Ok(())
}
