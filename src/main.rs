use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "ocr-image-translator",
    version,
    about = "Translate the text inside an image and redraw it in place"
)]
struct Cli {
    /// Image to translate (default from settings: input_en.png)
    #[arg(short = 'i', long = "input")]
    input: Option<String>,

    /// Where to write the result; format follows the extension
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Target language code (default: zh-cn)
    #[arg(short = 'l', long = "lang")]
    lang: Option<String>,

    /// Tesseract language(s) of the source text, e.g. eng or eng+deu
    #[arg(short = 'L', long = "source-lang")]
    source_lang: Option<String>,

    /// Font file used for the replacement text (.ttf/.otf/.ttc)
    #[arg(long = "font")]
    font: Option<String>,

    /// Translation provider: google, openai or openai:MODEL
    #[arg(short = 'p', long = "provider")]
    provider: Option<String>,

    /// API key (overrides OPENAI_API_KEY)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    ocr_image_translator::logging::init(cli.verbose)?;

    let output = ocr_image_translator::run(ocr_image_translator::Config {
        input: cli.input,
        output: cli.output,
        lang: cli.lang,
        source_lang: cli.source_lang,
        font: cli.font,
        provider: cli.provider,
        key: cli.key,
        settings_path: cli.read_settings,
    })?;

    println!("{}", output);
    Ok(())
}
