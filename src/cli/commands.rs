//! Command handlers

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use console::style;
use tracing::{debug, info, warn};

use super::args::{CookiesCommand, EnvCommand, RunArgs, SendArgs};
use super::output;
use crate::collection::{resolve_collection, Collection};
use crate::config::Config;
use crate::engine::Engine;
use crate::environment::Environment;
use crate::history::HistoryEntry;
use crate::errors::{BoltError, Result};
use crate::runner::report::{self, ReportFormat};
use crate::runner::CollectionRunner;
use crate::scripting::ScriptSandbox;
use crate::signals;
use crate::status::ExitStatus;
use crate::store::FileStore;
use crate::transport::HttpTransport;
use crate::workspace::Workspace;

/// Shared state for one CLI invocation
#[derive(Debug, Clone)]
pub struct App {
    pub config: Config,
    pub workspace: Workspace,
}

impl App {
    pub fn new(config: Config, data_dir: &Path) -> Self {
        debug!(data_dir = %data_dir.display(), "using data directory");
        Self {
            workspace: Workspace::new(Arc::new(FileStore::new(data_dir))),
            config,
        }
    }

    fn collection(&self, selector: &str) -> Result<Collection> {
        let mut collections = self.workspace.load_collections()?;
        let index = resolve_collection(&collections, selector)
            .ok_or_else(|| BoltError::Argument(format!("collection not found: {}", selector)))?;
        Ok(collections.swap_remove(index))
    }

    fn engine(&self, timeout_secs: Option<u64>) -> Result<Engine> {
        let timeout = timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.config.request_timeout());
        let transport = HttpTransport::new(timeout)?;
        Engine::load(
            self.workspace.clone(),
            ScriptSandbox::new(self.config.sandbox_limits()),
            Arc::new(transport),
        )
    }
}

pub async fn run(app: &App, args: RunArgs) -> Result<ExitStatus> {
    let collection = app.collection(&args.collection)?;
    if collection.is_empty() {
        return Err(BoltError::Collection(format!("collection '{}' has no requests", collection.name)));
    }
    let mut engine = app.engine(args.timeout)?;

    let mut runner = CollectionRunner::new(collection);
    runner.open(engine.env());

    if let Some(selector) = &args.env {
        let index = engine.env().resolve(selector)?;
        runner.set_environment(index, engine.env())?;
    }
    runner.set_iterations(args.iterations.unwrap_or(app.config.defaults.iterations))?;
    let delay = args
        .delay
        .map(Duration::from_millis)
        .unwrap_or_else(|| app.config.run_delay());
    runner.set_delay(delay)?;

    if !args.only.is_empty() {
        let indices = args
            .only
            .iter()
            .map(|selector| {
                runner
                    .collection()
                    .resolve(selector)
                    .ok_or_else(|| BoltError::Argument(format!("request not found: {}", selector)))
            })
            .collect::<Result<Vec<_>>>()?;
        runner.select_only(&indices)?;
    }

    let planned = runner
        .config()
        .map(|c| c.selected_indices().len() as u64 * u64::from(c.iterations))
        .unwrap_or(0);
    let mut progress = output::ProgressObserver::new(planned, !args.no_progress);

    let token = signals::run_token();
    let result = runner.run(&mut engine, &token, &mut progress).await;
    signals::clear_run_token();
    progress.finish();
    let summary = result?;

    println!("{}", output::results_table(runner.results()));
    println!("{}", output::summary_line(&summary));
    if let Some(failure) = &summary.failure {
        eprintln!("{} {}", style("error:").red().bold(), failure);
    }

    if args.console {
        for line in output::console_lines(engine.sandbox().console().entries()) {
            println!("{}", line);
        }
    }

    let name = runner.collection().name.clone();
    if let Some(path) = &args.export {
        report::write_report(path, ReportFormat::Json, &name, &summary, runner.results())?;
        info!(path = %path.display(), "exported run");
    }
    if let Some(path) = &args.junit {
        report::write_report(path, ReportFormat::JUnit, &name, &summary, runner.results())?;
        info!(path = %path.display(), "wrote JUnit report");
    }

    Ok(ExitStatus::from_summary(&summary, signals::was_interrupted()))
}

pub async fn send(app: &App, args: SendArgs) -> Result<ExitStatus> {
    let collection = app.collection(&args.collection)?;
    let index = collection
        .resolve(&args.request)
        .ok_or_else(|| BoltError::Argument(format!("request not found: {}", args.request)))?;
    let definition = &collection.requests[index];

    let mut engine = app.engine(args.timeout)?;
    let original = engine.env().active_index();
    if let Some(selector) = &args.env {
        let env_index = engine.env().resolve(selector)?;
        engine.env_mut().switch_active(env_index)?;
    }

    let execution = engine.execute(definition).await?;
    engine.env_mut().switch_active(original)?;

    if let Some(entry) = HistoryEntry::from_execution(&execution) {
        if let Err(e) = app.workspace.record_history(entry) {
            warn!(error = %e, "could not record history");
        }
    }

    for line in output::console_lines(engine.sandbox().console().entries()) {
        eprintln!("{}", line);
    }

    let response = match (&execution.error, &execution.response) {
        (None, Some(response)) => response,
        _ => {
            let error = execution.error.as_deref().unwrap_or("request was not sent");
            eprintln!("{} {}", style("error:").red().bold(), error);
            return Ok(ExitStatus::Failures);
        }
    };

    println!("{} {}", style(&definition.method).bold(), execution.url);
    println!("{}", output::response_status_line(response));
    if args.headers {
        for (name, value) in &response.headers {
            println!("{}: {}", style(name).cyan(), value);
        }
    }
    println!();
    match &args.output {
        Some(path) => {
            save_response(path, &response.body)?;
            println!("Saved {} bytes to {}", response.body.len(), path.display());
        }
        None => println!("{}", response.body),
    }

    let tests = output::test_lines(&execution.outcome);
    if !tests.is_empty() {
        println!();
        for line in tests {
            println!("{}", line);
        }
    }

    Ok(if execution.passed() {
        ExitStatus::Success
    } else {
        ExitStatus::Failures
    })
}

/// Write a response body, creating missing parent directories
fn save_response(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, body)?;
    info!(path = %path.display(), "saved response body");
    Ok(())
}

pub fn env(app: &App, command: EnvCommand) -> Result<ExitStatus> {
    let ws = &app.workspace;
    let mut env = ws.load_environments()?;

    match command {
        EnvCommand::List { values } => {
            println!("{}", output::environments_table(&env, values));
        }
        EnvCommand::Use { env: selector } => {
            let index = env.resolve(&selector)?;
            env.switch_active(index)?;
            ws.save_active_environment(&env)?;
            println!("Active environment: {}", style(&env.active().name).bold());
        }
        EnvCommand::Set { key, value, env: selector } => {
            with_target(&mut env, selector.as_deref(), |env| env.set_variable(key, value))?;
            ws.save_environments(&env)?;
        }
        EnvCommand::Unset { key, env: selector } => {
            let removed = with_target(&mut env, selector.as_deref(), |env| env.unset_variable(&key))?;
            if removed.is_none() {
                return Err(BoltError::Argument(format!("variable not set: {}", key)));
            }
            ws.save_environments(&env)?;
        }
        EnvCommand::Add { name } => {
            if env.find(&name).is_some() {
                return Err(BoltError::Argument(format!("environment already exists: {}", name)));
            }
            env.add(Environment::new(name));
            ws.save_environments(&env)?;
        }
        EnvCommand::Remove { env: selector } => {
            let index = env.resolve(&selector)?;
            let removed = env.remove(index)?;
            ws.save_environments(&env)?;
            ws.save_active_environment(&env)?;
            println!("Removed environment {}", style(removed.name).bold());
        }
    }
    Ok(ExitStatus::Success)
}

/// Apply `f` with the selected environment temporarily active
fn with_target<T>(
    env: &mut crate::environment::EnvironmentStore,
    selector: Option<&str>,
    f: impl FnOnce(&mut crate::environment::EnvironmentStore) -> T,
) -> Result<T> {
    let original = env.active_index();
    if let Some(selector) = selector {
        let index = env.resolve(selector)?;
        env.switch_active(index)?;
    }
    let value = f(env);
    env.switch_active(original)?;
    Ok(value)
}

pub fn cookies(app: &App, command: CookiesCommand) -> Result<ExitStatus> {
    let ws = &app.workspace;
    let mut jar = ws.load_cookies()?;

    match command {
        CookiesCommand::List { domain } => {
            let purged = jar.purge_expired();
            if purged > 0 {
                ws.save_cookies(&jar)?;
            }
            if jar.is_empty() {
                println!("No cookies stored");
            } else {
                println!("{}", output::cookies_table(&jar, domain.as_deref()));
            }
        }
        CookiesCommand::Delete { domain, name } => {
            let deleted = match &name {
                Some(name) => jar.delete(&domain, name),
                None => jar.delete_domain(&domain),
            };
            if !deleted {
                return Err(BoltError::Argument(format!("no matching cookie for {}", domain)));
            }
            ws.save_cookies(&jar)?;
        }
        CookiesCommand::Clear => {
            jar.delete_all();
            ws.save_cookies(&jar)?;
        }
    }
    Ok(ExitStatus::Success)
}

pub fn import(app: &App, file: &Path) -> Result<ExitStatus> {
    let count = app.workspace.import(file)?;
    println!("Imported {} collection(s)", count);
    Ok(ExitStatus::Success)
}

pub fn collections(app: &App) -> Result<ExitStatus> {
    let collections = app.workspace.load_collections()?;
    if collections.is_empty() {
        println!("No collections. Use `bolt import <file>` to add one.");
    } else {
        println!("{}", output::collections_table(&collections));
    }
    Ok(ExitStatus::Success)
}

pub fn history(app: &App, clear: bool) -> Result<ExitStatus> {
    if clear {
        app.workspace.clear_history()?;
        println!("History cleared");
        return Ok(ExitStatus::Success);
    }
    let entries = app.workspace.load_history()?;
    if entries.is_empty() {
        println!("No history yet");
    } else {
        println!("{}", output::history_table(&entries));
    }
    Ok(ExitStatus::Success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::EnvironmentStore;
    use crate::request::RequestDefinition;
    use tempfile::TempDir;

    fn app(dir: &TempDir) -> App {
        App::new(Config::default(), dir.path())
    }

    #[test]
    fn test_env_commands_persist() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);

        env(&app, EnvCommand::Add { name: "prod".into() }).unwrap();
        env(
            &app,
            EnvCommand::Set {
                key: "base".into(),
                value: "https://prod.test".into(),
                env: Some("prod".into()),
            },
        )
        .unwrap();
        env(&app, EnvCommand::Use { env: "2".into() }).unwrap();

        let loaded = app.workspace.load_environments().unwrap();
        assert_eq!(loaded.active().name, "prod");
        assert_eq!(loaded.get("base"), Some("https://prod.test"));
        assert_eq!(loaded.environments()[0].variables.len(), 0);
    }

    #[test]
    fn test_env_unset_missing_variable() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        let err = env(&app, EnvCommand::Unset { key: "nope".into(), env: None }).unwrap_err();
        assert!(matches!(err, BoltError::Argument(_)));
    }

    #[test]
    fn test_with_target_restores_active() {
        let mut store = EnvironmentStore::new(vec![Environment::new("a"), Environment::new("b")], 0);
        with_target(&mut store, Some("b"), |env| env.set_variable("k", "v")).unwrap();
        assert_eq!(store.active_index(), 0);
        assert_eq!(store.environments()[1].variables.get("k").map(String::as_str), Some("v"));
    }

    #[test]
    fn test_collection_lookup() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        app.workspace
            .save_collections(&[
                Collection::new("First"),
                Collection::new("Second").with_request(RequestDefinition::new("GET", "https://x.test")),
            ])
            .unwrap();

        assert_eq!(app.collection("2").unwrap().name, "Second");
        assert_eq!(app.collection("First").unwrap().name, "First");
        assert!(app.collection("Third").is_err());
    }

    #[test]
    fn test_save_response_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/body.json");
        save_response(&path, "{\"ok\":true}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"ok\":true}");
    }

    #[test]
    fn test_history_clear() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        app.workspace
            .record_history(HistoryEntry::new("GET", "https://x.test"))
            .unwrap();
        history(&app, true).unwrap();
        assert!(app.workspace.load_history().unwrap().is_empty());
    }

    #[test]
    fn test_cookie_delete_unknown() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        let err = cookies(
            &app,
            CookiesCommand::Delete {
                domain: "api.test".into(),
                name: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, BoltError::Argument(_)));
    }
}
