//! Query command implementation
//!
//! Prints one page of the live patients, payments or per-patient totals as
//! JSON. Patients can be narrowed by their payment total and payments by
//! their own or their patient's external id.

use crate::adapters::store::{create_reload_store, ReloadStore};
use crate::cli::commands::{exit_code, EXIT_CONFIG, EXIT_SUCCESS};
use crate::config::load_config;
use crate::domain::{ExternalId, Page, PatientFilter, PaymentFilter, ReloadError, Result};
use clap::{Args, Subcommand};
use rust_decimal::Decimal;

/// Arguments for the query command
#[derive(Args, Debug)]
pub struct QueryArgs {
    #[command(subcommand)]
    pub target: QueryTarget,
}

/// What to read
#[derive(Subcommand, Debug)]
pub enum QueryTarget {
    /// List patients, optionally by payment total
    Patients {
        /// Lowest payment total to include
        #[arg(long)]
        payment_min: Option<Decimal>,

        /// Highest payment total to include
        #[arg(long)]
        payment_max: Option<Decimal>,

        /// Page number, 100 rows per page
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,
    },

    /// List payments
    Payments {
        /// Only the payment with this external id
        #[arg(long)]
        external_id: Option<ExternalId>,

        /// Only payments of this patient
        #[arg(long)]
        patient_id: Option<ExternalId>,

        /// Page number, 100 rows per page
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,
    },

    /// List per-patient payment totals
    Stats {
        /// Page number, 100 rows per page
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,
    },
}

impl QueryArgs {
    /// Execute the query command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {}", e);
                return Ok(EXIT_CONFIG);
            }
        };

        let store = match create_reload_store(&config).await {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Failed to connect to database");
                println!("   Error: {}", e);
                return Ok(exit_code(&e));
            }
        };

        match self.render(store.as_ref()).await {
            Ok(json) => {
                println!("{json}");
                Ok(EXIT_SUCCESS)
            }
            Err(e) => {
                println!("❌ Query failed");
                println!("   Error: {}", e);
                Ok(exit_code(&e))
            }
        }
    }

    /// Run the query against `store` and render the page as pretty JSON
    pub async fn render(&self, store: &(dyn ReloadStore + Send + Sync)) -> Result<String> {
        let json = match &self.target {
            QueryTarget::Patients {
                payment_min,
                payment_max,
                page,
            } => {
                let filter = PatientFilter {
                    payment_min: *payment_min,
                    payment_max: *payment_max,
                };
                tracing::debug!(?filter, page, "Querying patients");
                serde_json::to_string_pretty(&store.query_patients(&filter, page_of(*page)?).await?)?
            }
            QueryTarget::Payments {
                external_id,
                patient_id,
                page,
            } => {
                let filter = PaymentFilter {
                    external_id: external_id.clone(),
                    patient_id: patient_id.clone(),
                };
                tracing::debug!(?filter, page, "Querying payments");
                serde_json::to_string_pretty(&store.query_payments(&filter, page_of(*page)?).await?)?
            }
            QueryTarget::Stats { page } => {
                serde_json::to_string_pretty(&store.query_stats(page_of(*page)?).await?)?
            }
        };
        Ok(json)
    }
}

fn page_of(number: u32) -> Result<Page> {
    Page::new(number).map_err(ReloadError::Configuration)
}
