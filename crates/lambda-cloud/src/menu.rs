//! Interactive main menu, shown when no subcommand is given.

use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Select};

use crate::app::{App, LaunchOptions};
use crate::prompt;
use crate::retry::RetryPolicy;
use crate::ui::{print_error, print_info, print_section};

/// Main menu entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    Refresh,
    Launch,
    Terminate,
    SshConfig,
    Exit,
}

impl MenuAction {
    const ALL: [Self; 5] = [
        Self::Refresh,
        Self::Launch,
        Self::Terminate,
        Self::SshConfig,
        Self::Exit,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::Refresh => "Refresh instance list",
            Self::Launch => "Launch new instance",
            Self::Terminate => "Terminate instance(s)",
            Self::SshConfig => "Manage SSH config",
            Self::Exit => "Exit",
        }
    }
}

/// Run the menu until the user exits.
///
/// Errors from individual actions are printed and the menu continues.
///
/// # Errors
/// Returns error only if the terminal cannot be driven.
pub async fn run(app: &App) -> Result<()> {
    let theme = ColorfulTheme::default();
    let labels: Vec<&str> = MenuAction::ALL.iter().map(|a| a.label()).collect();

    loop {
        print_section("LAMBDA CLOUD");
        let instances = match app.list_instances().await {
            Ok(instances) => instances,
            Err(e) => {
                print_error(&format!("{e:#}"));
                Vec::new()
            }
        };

        let choice = Select::with_theme(&theme)
            .with_prompt("What would you like to do?")
            .default(0)
            .items(&labels)
            .interact_opt()?;
        let action = choice
            .and_then(|i| MenuAction::ALL.get(i).copied())
            .unwrap_or(MenuAction::Exit);

        let result = match action {
            MenuAction::Refresh => continue,
            MenuAction::Launch => app.launch(interactive_launch()).await,
            MenuAction::Terminate => {
                if instances.is_empty() {
                    print_info("No running instances to terminate.");
                    Ok(())
                } else {
                    match prompt::select_termination_target(&instances)? {
                        Some(target) => app.terminate(target, false).await,
                        None => Ok(()),
                    }
                }
            }
            MenuAction::SshConfig => ssh_config_menu(app, &theme).await,
            MenuAction::Exit => {
                println!("Goodbye!");
                return Ok(());
            }
        };

        if let Err(e) = result {
            print_error(&format!("{e:#}"));
        }
    }
}

fn interactive_launch() -> LaunchOptions {
    LaunchOptions {
        instance_type: None,
        ssh_key: None,
        region: None,
        name: None,
        quantity: 1,
        wait: false,
        policy: RetryPolicy::default(),
        show_all: false,
    }
}

async fn ssh_config_menu(app: &App, theme: &ColorfulTheme) -> Result<()> {
    let choice = Select::with_theme(theme)
        .with_prompt("SSH config")
        .default(0)
        .items(&["Add instance to SSH config", "Remove all Lambda Cloud entries"])
        .interact_opt()?;

    match choice {
        Some(0) => app.ssh_config_add(None, None).await,
        Some(_) => app.ssh_config_remove(false),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_labels_follow_action_order() {
        let labels: Vec<&str> = MenuAction::ALL.iter().map(|a| a.label()).collect();
        assert_eq!(labels.first(), Some(&"Refresh instance list"));
        assert_eq!(labels.last(), Some(&"Exit"));
        assert_eq!(MenuAction::ALL[1], MenuAction::Launch);
    }

    #[test]
    fn test_interactive_launch_defaults() {
        let options = interactive_launch();
        assert_eq!(options.quantity, 1);
        assert!(!options.wait);
        assert_eq!(options.policy, RetryPolicy::default());
    }
}
