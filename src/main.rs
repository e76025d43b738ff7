use anyhow::{Context, Result};
use epidash_core::Config;
use epidash_services::Dataset;
use epidash_ui::{render_chart, AppServices, Decision, Route};
use tokio::io::{AsyncBufReadExt, BufReader};

const CHART_WIDTH: usize = 50;

const HELP: &str = "\
Navigation:
  go <path>                  open /login, /data or /forecast
  data | forecast            header shortcuts
  logout                     sign out
  quit
Login (/login):
  login <name> <password>
  register <name> <password> [full name]
Data (/data):
  dataset <covid19|pneumania>
  from <YYYY-MM-DD>, to <YYYY-MM-DD>
  show                       load and chart the series
Forecast (/forecast):
  dataset <covid19|pneumania>
  horizon <days>
  predict                    forecast from today";

#[tokio::main]
async fn main() -> Result<()> {
    epidash_core::init()?;

    let (config, validation) =
        Config::load_validated().context("Failed to load configuration")?;
    tracing::info!(
        "Configuration loaded with {} warning(s)",
        validation.warnings.len()
    );
    let app = AppServices::new(config)?;
    tracing::info!("EpiDash started");

    println!("EpiDash - epidemiological data and forecasts");
    println!("Backend: {}", app.http().base_url());
    println!("Type 'help' for commands.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut shown = None;
    loop {
        let route = app.settle_route().await;
        if shown != Some(route) {
            print_screen(&app, route);
            shown = Some(route);
        }
        print_prompt(route);

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, args)) = words.split_first() else {
            continue;
        };

        match command {
            "quit" | "exit" => break,
            "help" => println!("{}", HELP),
            "go" => match args.first() {
                Some(path) => report(app.navigator().navigate(path)),
                None => println!("usage: go <path>"),
            },
            "data" => report(app.show_data()),
            "forecast" => report(app.show_forecast()),
            "logout" => {
                app.logout().await;
            }
            _ => match route {
                Route::Login => login_command(&app, command, args).await,
                Route::Data => data_command(&app, command, args).await,
                Route::Forecast => forecast_command(&app, command, args).await,
            },
        }
    }

    app.shutdown();
    tracing::info!("EpiDash stopped");
    Ok(())
}

fn print_prompt(route: Route) {
    use std::io::Write;

    print!("{}> ", route);
    let _ = std::io::stdout().flush();
}

fn print_screen(app: &AppServices, route: Route) {
    match route {
        Route::Login => {
            let login = app.login().login();
            if login.is_empty() {
                println!("== Sign in ==");
            } else {
                println!("== Sign in (last user: {}) ==", login);
            }
        }
        Route::Data => println!("== Historical data: {} ==", app.data().dataset().label()),
        Route::Forecast => println!(
            "== Forecast: {}, {} day(s) ==",
            app.forecast().dataset().label(),
            app.forecast().horizon()
        ),
    }
}

fn report(decision: Decision) {
    if let Decision::Redirect(to) = decision {
        println!("Redirected to {}", to);
    }
}

fn parse_dataset(args: &[&str]) -> Option<Dataset> {
    match args.first().map(|s| s.parse::<Dataset>()) {
        Some(Ok(dataset)) => Some(dataset),
        Some(Err(e)) => {
            println!("{}", e);
            None
        }
        None => {
            println!("usage: dataset <covid19|pneumania>");
            None
        }
    }
}

async fn login_command(app: &AppServices, command: &str, args: &[&str]) {
    let model = app.login();
    match (command, args) {
        ("login", [name, password]) => {
            model.set_login(*name);
            model.set_password(*password);
            if model.submit().await.is_err() {
                print_error(model.error_message());
            }
        }
        ("register", [name, password, fio @ ..]) => {
            model.set_login(*name);
            model.set_password(*password);
            let fio = (!fio.is_empty()).then(|| fio.join(" "));
            match model.register(fio).await {
                Ok(message) => println!("{}", message),
                Err(_) => print_error(model.error_message()),
            }
        }
        _ => println!("Unknown command on {}. Type 'help'.", Route::Login),
    }
}

async fn data_command(app: &AppServices, command: &str, args: &[&str]) {
    let model = app.data();
    match (command, args) {
        ("dataset", _) => {
            if let Some(dataset) = parse_dataset(args) {
                model.set_dataset(dataset);
            }
        }
        ("from", [date]) => model.set_date_from(*date),
        ("to", [date]) => model.set_date_to(*date),
        ("show", []) => match model.fetch().await {
            Ok(_) => print!("{}", render_chart(&model.points(), CHART_WIDTH)),
            Err(e) if e.is_superseded() => {}
            Err(_) => print_error(model.error_message()),
        },
        _ => println!("Unknown command on {}. Type 'help'.", Route::Data),
    }
}

async fn forecast_command(app: &AppServices, command: &str, args: &[&str]) {
    let model = app.forecast();
    match (command, args) {
        ("dataset", _) => {
            if let Some(dataset) = parse_dataset(args) {
                model.set_dataset(dataset);
            }
        }
        ("horizon", [days]) => match days.parse::<u32>() {
            Ok(days) => model.set_horizon(days),
            Err(_) => println!("horizon: must be a number from 1 to {}", model.max_horizon()),
        },
        ("predict", []) => match model.forecast().await {
            Ok(_) => print!("{}", render_chart(&model.points(), CHART_WIDTH)),
            Err(e) if e.is_superseded() => {}
            Err(_) => print_error(model.error_message()),
        },
        _ => println!("Unknown command on {}. Type 'help'.", Route::Forecast),
    }
}

fn print_error(message: Option<String>) {
    println!("Error: {}", message.unwrap_or_else(|| "unknown error".to_string()));
}
