use clap::{Args, Subcommand};
use termstore_core::{Fields, TermTaxonomyStorage, Value, VpId};

use super::{parse_field, print_change, print_fields, OutputFormat};

#[derive(Args)]
pub struct TaxonomyCommand {
    #[command(subcommand)]
    pub command: TaxonomySubcommand,
}

#[derive(Subcommand)]
pub enum TaxonomySubcommand {
    /// Show a taxonomy record
    Show {
        /// Taxonomy ID
        id: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List all taxonomy records
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Create or update a taxonomy record
    Set {
        /// Taxonomy ID
        id: String,

        /// Taxonomy name (e.g. category, post_tag)
        #[arg(long)]
        taxonomy: Option<String>,

        /// Term the record belongs to, for new records
        #[arg(long)]
        term: Option<String>,

        /// Field to set (can be repeated)
        #[arg(long = "field", value_name = "KEY=VALUE", value_parser = parse_field)]
        fields: Vec<(String, Value)>,
    },

    /// Delete a taxonomy record
    Delete {
        /// Taxonomy ID
        id: String,
    },
}

impl TaxonomyCommand {
    pub fn run(&self, repo: &TermTaxonomyStorage) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            TaxonomySubcommand::Show { id, format } => {
                let id = VpId::parse(id)?;
                let Some(record) = repo.load_entity(&id)? else {
                    return Err(format!("Taxonomy not found: {}", id).into());
                };

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&record)?);
                    }
                    OutputFormat::Text => {
                        println!("{} (term {})", record.vp_id, record.vp_term_id);
                        print_fields(&record.fields);
                    }
                }
                Ok(())
            }

            TaxonomySubcommand::List { format } => {
                let records = repo.load_all()?;

                if records.is_empty() {
                    println!("No taxonomies found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        let list: Vec<_> = records.values().collect();
                        println!("{}", serde_json::to_string_pretty(&list)?);
                    }
                    OutputFormat::Text => {
                        println!("{:<32}  {:<32}  TAXONOMY", "ID", "TERM");
                        println!("{}", "-".repeat(80));
                        for record in records.values() {
                            println!(
                                "{:<32}  {:<32}  {}",
                                record.vp_id,
                                record.vp_term_id,
                                record.taxonomy().unwrap_or("-")
                            );
                        }
                        println!("\nTotal: {} taxonomy record(s)", records.len());
                    }
                }
                Ok(())
            }

            TaxonomySubcommand::Set {
                id,
                taxonomy,
                term,
                fields,
            } => {
                let mut update = Fields::new();
                update.insert("vp_id".to_string(), Value::from(VpId::parse(id)?.to_string()));
                if let Some(term) = term {
                    update.insert(
                        "vp_term_id".to_string(),
                        Value::from(VpId::parse(term)?.to_string()),
                    );
                }
                if let Some(taxonomy) = taxonomy {
                    update.insert("taxonomy".to_string(), Value::from(taxonomy.as_str()));
                }
                for (key, value) in fields {
                    update.insert(key.clone(), value.clone());
                }

                if !repo.should_be_saved(&update) {
                    println!("No changes.");
                    return Ok(());
                }

                print_change(repo.save(&update)?);
                Ok(())
            }

            TaxonomySubcommand::Delete { id } => {
                let mut restriction = Fields::new();
                restriction.insert("vp_id".to_string(), Value::from(VpId::parse(id)?.to_string()));

                print_change(repo.delete(&restriction)?);
                Ok(())
            }
        }
    }
}
