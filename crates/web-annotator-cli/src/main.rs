use anyhow::{Context, Result, bail};
use std::{env, path::PathBuf, process};
use web_annotator_config::Config;
use web_annotator_engine::panel::{export_file_name, export_json};
use web_annotator_engine::store::{PAGE_KEY_PREFIX, page_key};
use web_annotator_engine::{AnchorStore, Color, ControlPanel, FileStorage, StorageBackend};

const USAGE: &str = "\
Commands:
  pages                          List annotated pages
  show <url>                     Print the annotations of a page
  export <url> [file]            Write a page's annotations as JSON
  import <url> <file>            Replace a page's annotations from a JSON export
  clear <url>                    Remove every annotation of a page
  prefs [highlight|draw|brush <value>]
                                 Show or change the preferences";

enum Command {
    Pages,
    Show(String),
    Export(String, Option<PathBuf>),
    Import(String, PathBuf),
    Clear(String),
    Prefs(Option<(String, String)>),
}

impl Command {
    fn parse(args: &[String]) -> Option<Self> {
        let rest: Vec<&str> = args.iter().map(String::as_str).collect();
        let command = match rest.as_slice() {
            ["pages"] => Command::Pages,
            ["show", url] => Command::Show(url.to_string()),
            ["export", url] => Command::Export(url.to_string(), None),
            ["export", url, file] => Command::Export(url.to_string(), Some(expand(file))),
            ["import", url, file] => Command::Import(url.to_string(), expand(file)),
            ["clear", url] => Command::Clear(url.to_string()),
            ["prefs"] => Command::Prefs(None),
            ["prefs", name, value] => Command::Prefs(Some((name.to_string(), value.to_string()))),
            _ => return None,
        };
        Some(command)
    }
}

/// Program name and command words. argv may be empty when the process was
/// spawned without one.
fn split_args(mut argv: impl Iterator<Item = String>) -> (String, Vec<String>) {
    let program = argv.next().unwrap_or_else(|| "web-annotator-cli".to_string());
    (program, argv.collect())
}

fn usage(program: &str) -> String {
    format!("Usage: {program} <command>\n{USAGE}")
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn open_storage() -> Result<FileStorage> {
    let config = match Config::load() {
        Ok(Some(config)) => config,
        Ok(None) => {
            log::debug!(
                "No config file at {}, using defaults",
                Config::config_path().display()
            );
            Config::default()
        }
        Err(e) => return Err(e).context("Failed to load config file"),
    };
    log::debug!("Using storage file {}", config.storage_path.display());
    Ok(FileStorage::with_quota(&config.storage_path, config.quota()))
}

fn open_page(storage: FileStorage, url: &str) -> Result<AnchorStore<FileStorage>> {
    let mut store = AnchorStore::new(storage, url);
    store
        .load()
        .with_context(|| format!("Failed to read annotations for {url}"))?;
    Ok(store)
}

fn list_pages(storage: FileStorage) -> Result<()> {
    let pages: Vec<String> = storage
        .keys()?
        .into_iter()
        .filter_map(|key| key.strip_prefix(PAGE_KEY_PREFIX).map(str::to_string))
        .collect();
    if pages.is_empty() {
        println!("No annotated pages");
    }
    for url in pages {
        let store = open_page(storage.clone(), &url)?;
        println!(
            "{url}  ({} highlights, {} drawings)",
            store.highlights().len(),
            store.drawings().len()
        );
    }
    Ok(())
}

fn show_page(storage: FileStorage, url: &str) -> Result<()> {
    let store = open_page(storage, url)?;
    if store.snapshot().is_empty() {
        println!("No annotations for {url}");
        return Ok(());
    }
    for highlight in store.highlights() {
        println!(
            "{} {} [{} @ {} .. {} @ {}] {:?}",
            highlight.id,
            highlight.color,
            highlight.start.path,
            highlight.start.offset,
            highlight.end.path,
            highlight.end.offset,
            highlight.text
        );
    }
    for (i, stroke) in store.drawings().iter().enumerate() {
        println!(
            "stroke {} {} width {} ({} points)",
            i + 1,
            stroke.color,
            stroke.stroke_width,
            stroke.points.len()
        );
    }
    Ok(())
}

fn export_page(storage: FileStorage, url: &str, file: Option<PathBuf>) -> Result<()> {
    let store = open_page(storage, url)?;
    let json = export_json(&store.snapshot())?;
    let file =
        file.unwrap_or_else(|| PathBuf::from(export_file_name(chrono::Local::now().date_naive())));
    std::fs::write(&file, json).with_context(|| format!("Failed to write {}", file.display()))?;
    println!("Exported {url} to {}", file.display());
    Ok(())
}

fn import_page(storage: FileStorage, url: &str, file: PathBuf) -> Result<()> {
    let json = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let mut store = AnchorStore::new(storage, url);
    store.replace_from_json(&json)?;
    log::info!("Imported {} into {}", file.display(), page_key(url));
    println!(
        "Imported {} highlights and {} drawings for {url}",
        store.highlights().len(),
        store.drawings().len()
    );
    Ok(())
}

fn clear_page(storage: FileStorage, url: &str) -> Result<()> {
    let mut store = open_page(storage, url)?;
    store.clear()?;
    println!("Cleared annotations for {url}");
    Ok(())
}

fn preferences(storage: FileStorage, change: Option<(String, String)>) -> Result<()> {
    let (mut panel, _) = ControlPanel::open(storage);
    if let Some((name, value)) = change {
        let request = match name.as_str() {
            "highlight" => panel.set_highlight_color(Color::new(value)),
            "draw" => panel.set_draw_color(Color::new(value)),
            "brush" => {
                let size: f64 = value
                    .parse()
                    .with_context(|| format!("Invalid brush size '{value}'"))?;
                if size <= 0.0 {
                    bail!("Brush size must be positive, got {size}");
                }
                panel.set_brush_size(size)
            }
            other => bail!("Unknown preference '{other}'; expected highlight, draw or brush"),
        };
        log::debug!("Preference change produces {request:?}");
    }
    let prefs = panel.preferences();
    println!("highlight color: {}", prefs.highlight_color);
    println!("draw color:      {}", prefs.draw_color);
    println!("brush size:      {}", prefs.brush_size);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let (program, args) = split_args(env::args());
    let Some(command) = Command::parse(&args) else {
        eprintln!("{}", usage(&program));
        process::exit(1);
    };

    let storage = open_storage()?;
    match command {
        Command::Pages => list_pages(storage),
        Command::Show(url) => show_page(storage, &url),
        Command::Export(url, file) => export_page(storage, &url, file),
        Command::Import(url, file) => import_page(storage, &url, file),
        Command::Clear(url) => clear_page(storage, &url),
        Command::Prefs(change) => preferences(storage, change),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert!(matches!(Command::parse(&args(&["pages"])), Some(Command::Pages)));
        assert!(matches!(
            Command::parse(&args(&["export", "https://a.test/"])),
            Some(Command::Export(_, None))
        ));
        assert!(matches!(
            Command::parse(&args(&["prefs", "brush", "8"])),
            Some(Command::Prefs(Some(_)))
        ));
        assert!(Command::parse(&args(&["show"])).is_none());
        assert!(Command::parse(&args(&[])).is_none());
    }

    #[test]
    fn test_empty_argv_falls_back_to_usage() {
        let (program, rest) = split_args(std::iter::empty());

        assert_eq!(program, "web-annotator-cli");
        assert!(Command::parse(&rest).is_none());
        let text = usage(&program);
        assert!(text.starts_with("Usage: web-annotator-cli <command>\n"));
        assert!(text.contains("export <url> [file]"));
    }

    #[test]
    fn test_split_args_drops_program_name() {
        let argv = args(&["/usr/bin/web-annotator-cli", "show", "u"]);

        let (program, rest) = split_args(argv.into_iter());

        assert_eq!(program, "/usr/bin/web-annotator-cli");
        assert!(matches!(Command::parse(&rest), Some(Command::Show(url)) if url == "u"));
    }

    #[test]
    fn test_import_then_export_round_trip() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("storage.json"));
        let source = dir.path().join("in.json");
        let target = dir.path().join("out.json");
        let json = r#"{
  "highlights": [
    {
      "type": "highlight",
      "id": "hl-1",
      "color": "ffff00",
      "startPath": "html > body > p",
      "startOffset": 0,
      "endPath": "html > body > p",
      "endOffset": 5,
      "text": "Hello"
    }
  ],
  "drawings": []
}"#;
        std::fs::write(&source, json).unwrap();

        import_page(storage.clone(), "https://a.test/", source).unwrap();
        export_page(storage.clone(), "https://a.test/", Some(target.clone())).unwrap();

        assert_eq!(std::fs::read_to_string(target).unwrap(), json);
        clear_page(storage.clone(), "https://a.test/").unwrap();
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_brush_size() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("storage.json"));

        assert!(preferences(storage.clone(), Some(("brush".into(), "-1".into()))).is_err());
        assert!(preferences(storage, Some(("eraser".into(), "1".into()))).is_err());
    }
}
