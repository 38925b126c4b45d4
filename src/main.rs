//! `oentex` command-line front end.
//!
//! ```text
//! oentex deals --sort rating --page 2
//! oentex rate --user <uuid> --company <uuid> --overall 5
//! oentex rate --user <uuid> --company <uuid> --score usability=4 --score fees=5
//! oentex open --deal <uuid>
//! oentex register --email someone@example.com
//! ```

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use oentex::configuration::get_configuration;
use oentex::forms::{CategoryScoresForm, RatingForm, RegistrationForm};
use oentex::models::RateCategory;
use oentex::services::{self, DealQuery, DealSort};
use oentex::startup::OentexApp;
use oentex::telemetry::{get_subscriber, init_subscriber};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "oentex",
    version,
    about = "Browse deals and rate companies on Oentex"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List active deals
    Deals {
        /// Only deals of companies in this category
        #[arg(long)]
        category: Option<String>,
        /// Match title, description or company name
        #[arg(long)]
        search: Option<String>,
        /// newest, rating, popular or commission
        #[arg(long, default_value = "newest")]
        sort: DealSort,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = services::catalog::DEFAULT_PER_PAGE)]
        per_page: usize,
    },
    /// Rate a company, either overall or per category
    Rate {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        company: Uuid,
        /// Overall score, 1 to 5
        #[arg(long, conflicts_with = "score")]
        overall: Option<u8>,
        /// Category score as category=N, repeatable
        #[arg(long, value_parser = parse_category_score)]
        score: Vec<(RateCategory, u8)>,
    },
    /// Open a deal's link and count the click
    Open {
        #[arg(long)]
        deal: Uuid,
    },
    /// Create an account
    Register {
        #[arg(long)]
        email: String,
        /// Password (or set OENTEX_PASSWORD)
        #[arg(long, env = "OENTEX_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

fn parse_category_score(value: &str) -> Result<(RateCategory, u8), String> {
    let (category, score) = value
        .split_once('=')
        .ok_or_else(|| format!("expected category=N, got '{}'", value))?;
    let category = category.parse::<RateCategory>().map_err(|e| e.to_string())?;
    let score = score
        .trim()
        .parse::<u8>()
        .map_err(|e| format!("invalid score '{}': {}", score, e))?;
    Ok((category, score))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = get_subscriber("oentex".into(), "warn".into());
    init_subscriber(subscriber);

    let cli = Cli::parse();
    let settings = get_configuration().context("Failed to read configuration.")?;
    let app = OentexApp::build(settings)?;

    match cli.command {
        Commands::Deals {
            category,
            search,
            sort,
            page,
            per_page,
        } => {
            let query = DealQuery {
                category,
                search,
                sort,
                page,
                per_page,
            };
            let page = app.queries.deals_page(&query).await?;
            for card in &page.items {
                let rating = card
                    .company
                    .as_ref()
                    .map(|c| c.rating_display().to_string())
                    .unwrap_or_default();
                println!(
                    "{}  {} | {} | {}  {}",
                    card.deal.id,
                    card.company_name(),
                    card.deal.title,
                    card.deal.value.as_deref().unwrap_or("-"),
                    rating
                );
            }
            println!(
                "page {}/{} ({} deals)",
                page.page,
                page.total_pages.max(1),
                page.total
            );
        }
        Commands::Rate {
            user,
            company,
            overall,
            score,
        } => {
            let form = match (overall, score.is_empty()) {
                (Some(overall), _) => RatingForm::quick(overall),
                (None, false) => {
                    let mut categories = CategoryScoresForm::default();
                    for (category, value) in score {
                        categories.set(category, value);
                    }
                    RatingForm::detailed(categories)
                }
                (None, true) => bail!("give either --overall or at least one --score"),
            };

            let aggregate = app.coordinator.submit_form(user, company, form).await?;
            println!("{}", aggregate.display());
        }
        Commands::Open { deal } => {
            let deals = app.queries.deals().await?;
            let card = deals
                .deals
                .iter()
                .find(|c| c.deal.id == deal)
                .ok_or_else(|| anyhow!("Deal {} not found", deal))?;
            let outcome = app.clicks.follow(&card.deal).await?;
            match outcome.clicks {
                Some(clicks) => println!("Opened {} ({} clicks)", card.deal.affiliate_link, clicks),
                None => println!("Opened {}", card.deal.affiliate_link),
            }
        }
        Commands::Register { email, password } => {
            let form = RegistrationForm {
                email,
                confirm_password: password.clone(),
                password,
            };
            let response =
                services::register(app.gateway.as_ref(), &form, app.signup_timeout()).await?;
            println!(
                "Registered {}. Check your inbox to confirm the account.",
                response.email.as_deref().unwrap_or(form.email.as_str())
            );
        }
    }

    Ok(())
}
