//! `formflow pages`: show page definitions and their field catalogs

use anyhow::Result;
use clap::Args;
use formflow_e2e::{FieldKind, PageDefinition};
use serde::Serialize;

use super::load_registry;
use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Args, Debug)]
pub struct PagesArgs {
    /// Directory of additional page definitions (*.yaml)
    #[arg(long)]
    pub pages: Option<std::path::PathBuf>,

    /// Only this page
    pub name: Option<String>,
}

#[derive(Serialize)]
pub struct FieldRow {
    pub page: String,
    pub route: String,
    pub field: String,
    pub locators: String,
    pub options: Option<usize>,
}

impl TableDisplay for FieldRow {
    fn headers() -> Vec<&'static str> {
        vec!["Page", "Route", "Field", "Locators", "Choice"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.page.clone(),
            self.route.clone(),
            self.field.clone(),
            self.locators.clone(),
            self.options
                .map(|n| format!("{} options", n))
                .unwrap_or_default(),
        ]
    }
}

fn field_rows(page: &PageDefinition) -> Result<Vec<FieldRow>> {
    page.catalog
        .fields()
        .iter()
        .map(|field| {
            Ok(FieldRow {
                page: page.name.clone(),
                route: page.route.clone(),
                field: field.name.clone(),
                locators: page.catalog.strategies(&field.name)?.to_string(),
                options: match &field.kind {
                    FieldKind::Choice { options } => Some(options.len()),
                    FieldKind::Text => None,
                },
            })
        })
        .collect()
}

pub fn execute(args: PagesArgs, format: OutputFormat) -> Result<()> {
    let registry = load_registry(args.pages.as_deref())?;

    let mut rows = Vec::new();
    match &args.name {
        Some(name) => rows.extend(field_rows(registry.get(name)?)?),
        None => {
            for page in registry.iter() {
                rows.extend(field_rows(page)?);
            }
        }
    }
    print_list(&rows, format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use formflow_e2e::pages;

    #[test]
    fn test_field_rows_show_fallbacks() {
        let page = pages::new_customer().unwrap();
        let rows = field_rows(&page).unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(
            rows[0].locators,
            "[data-testid=\"customer-first-name\"] -> role=textbox[name=\"First Name\"]"
        );
    }

    #[test]
    fn test_state_row_counts_options() {
        let page = pages::create_customer().unwrap();
        let rows = field_rows(&page).unwrap();
        let state = rows.iter().find(|r| r.field == "State").unwrap();
        assert_eq!(state.options, Some(pages::US_STATES.len()));
    }
}
