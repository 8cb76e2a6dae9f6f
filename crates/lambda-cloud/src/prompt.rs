//! Interactive pickers built on `dialoguer`.
//!
//! Every picker returns `Ok(None)` when the user backs out with Esc or `q`.

use anyhow::Result;
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};

use crate::inventory::InventoryModel;
use crate::providers::traits::{Instance, InstanceType};
use crate::terminate::TerminationTarget;
use crate::ui::{format_instance_line, format_type_choice, print_warning, type_choice_header};

const SHOW_UNAVAILABLE: &str = "[Show unavailable instance types]";
const HIDE_UNAVAILABLE: &str = "[Hide unavailable instance types]";

/// Rows for the instance type picker: the types followed by the toggle entry.
fn type_rows(types: &[&InstanceType], include_unavailable: bool) -> Vec<String> {
    let mut rows: Vec<String> = types.iter().map(|t| format_type_choice(t)).collect();
    rows.push(
        if include_unavailable {
            HIDE_UNAVAILABLE
        } else {
            SHOW_UNAVAILABLE
        }
        .to_string(),
    );
    rows
}

/// Pick an instance type from the last inventory snapshot.
///
/// Available types are listed first. The last row toggles whether types with
/// no capacity are shown.
pub fn select_instance_type(
    inventory: &InventoryModel,
    include_unavailable: bool,
) -> Result<Option<String>> {
    let theme = ColorfulTheme::default();
    let mut include_unavailable = include_unavailable;

    loop {
        let types = inventory.for_selection(include_unavailable);
        if types.is_empty() && !include_unavailable {
            print_warning("No instance types currently have capacity.");
        }

        println!("\n{}", type_choice_header().bold());
        let rows = type_rows(&types, include_unavailable);
        let Some(index) = Select::with_theme(&theme)
            .with_prompt("Select instance type")
            .default(0)
            .items(&rows)
            .interact_opt()?
        else {
            return Ok(None);
        };

        match types.get(index) {
            Some(t) => return Ok(Some(t.name.clone())),
            None => include_unavailable = !include_unavailable,
        }
    }
}

/// Pick one SSH key name.
pub fn select_ssh_key(names: &[String]) -> Result<Option<String>> {
    let index = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select SSH key")
        .default(0)
        .items(names)
        .interact_opt()?;
    Ok(index.and_then(|i| names.get(i).cloned()))
}

/// Pick one running instance.
pub fn select_instance<'a>(instances: &'a [Instance], prompt: &str) -> Result<Option<&'a Instance>> {
    let rows: Vec<String> = instances.iter().map(format_instance_line).collect();
    let index = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(0)
        .items(&rows)
        .interact_opt()?;
    Ok(index.and_then(|i| instances.get(i)))
}

/// Pick one instance or every instance for termination.
pub fn select_termination_target(instances: &[Instance]) -> Result<Option<TerminationTarget>> {
    let mut rows: Vec<String> = instances.iter().map(format_instance_line).collect();
    rows.push(format!("[All {} instance(s)]", instances.len()));

    let index = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select instance to terminate")
        .default(0)
        .items(&rows)
        .interact_opt()?;

    Ok(index.map(|i| match instances.get(i) {
        Some(instance) => TerminationTarget::Ids(vec![instance.id.clone()]),
        None => TerminationTarget::All,
    }))
}

/// Yes/no question.
pub fn confirm(prompt: &str, default: bool) -> Result<bool> {
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(default)
        .interact()?)
}

/// Free-text input with a default.
pub fn input(prompt: &str, default: &str) -> Result<String> {
    Ok(Input::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(default.to_string())
        .interact_text()?)
}
