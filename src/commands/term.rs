use clap::{Args, Subcommand};
use termstore_core::{Fields, TermTaxonomyStorage, Value, VpId};

use super::{parse_field, print_change, print_fields, OutputFormat};

#[derive(Args)]
pub struct TermCommand {
    #[command(subcommand)]
    pub command: TermSubcommand,
}

#[derive(Subcommand)]
pub enum TermSubcommand {
    /// Create or update a term
    Set {
        /// Term ID (generated when omitted)
        id: Option<String>,

        /// Field to set (can be repeated)
        #[arg(long = "field", value_name = "KEY=VALUE", value_parser = parse_field)]
        fields: Vec<(String, Value)>,
    },

    /// Show a term's own fields
    Show {
        /// Term ID
        id: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl TermCommand {
    pub fn run(&self, repo: &TermTaxonomyStorage) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            TermSubcommand::Set { id, fields } => {
                let id = match id {
                    Some(id) => VpId::parse(id)?,
                    None => VpId::generate(),
                };

                let mut update = Fields::new();
                update.insert("vp_id".to_string(), Value::from(id.to_string()));
                for (key, value) in fields {
                    update.insert(key.clone(), value.clone());
                }

                print_change(repo.save_term(&update)?);
                Ok(())
            }

            TermSubcommand::Show { id, format } => {
                let id = VpId::parse(id)?;
                let Some(term) = repo.load_term(&id)? else {
                    return Err(format!("Term not found: {}", id).into());
                };

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&term)?);
                    }
                    OutputFormat::Text => {
                        println!("{}", id);
                        print_fields(&term);
                    }
                }
                Ok(())
            }
        }
    }
}
