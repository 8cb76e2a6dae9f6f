//! User-facing operations shared by the subcommands and the interactive menu.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use colored::Colorize;

use crate::interrupt::InterruptRouter;
use crate::inventory::InventoryModel;
use crate::launch::{LaunchCoordinator, LaunchOutcome, LaunchRequest};
use crate::prompt;
use crate::providers::traits::{GpuProvider, Instance, SshKey};
use crate::retry::{RetryEngine, RetryOutcome, RetryPolicy};
use crate::ssh_config::SshConfig;
use crate::terminate::{TerminationCoordinator, TerminationTarget};
use crate::ui::{
    self, format_elapsed, print_hint, print_info, print_launched, print_section, print_success,
    print_termination_results, print_warning, AvailabilityFilter, ConsoleObserver,
};

/// Where SSH keys are managed in the dashboard.
const SSH_KEYS_URL: &str = "https://cloud.lambda.ai/ssh-keys";

/// Options for [`App::launch`].
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Instance type; picked interactively when `None`.
    pub instance_type: Option<String>,
    /// SSH key name; resolved from the account when `None`.
    pub ssh_key: Option<String>,
    /// Pin the launch to this region.
    pub region: Option<String>,
    /// Name for the new instances.
    pub name: Option<String>,
    /// Number of instances.
    pub quantity: u32,
    /// Keep retrying until capacity appears.
    pub wait: bool,
    /// Retry cadence when `wait` is set.
    pub policy: RetryPolicy,
    /// Include types without capacity in the interactive picker.
    pub show_all: bool,
}

/// How the SSH key for a launch gets decided.
#[derive(Debug, PartialEq, Eq)]
pub enum KeyChoice {
    /// Use this key.
    Use(String),
    /// Ask the user to pick among these.
    Pick(Vec<String>),
}

/// Decide which SSH key to launch with.
///
/// # Errors
/// Fails if the account has no keys or `requested` is not one of them.
pub fn choose_ssh_key(keys: &[SshKey], requested: Option<&str>) -> Result<KeyChoice> {
    let names: Vec<String> = keys.iter().map(|k| k.name.clone()).collect();

    if let Some(requested) = requested {
        if names.iter().any(|n| n == requested) {
            return Ok(KeyChoice::Use(requested.to_string()));
        }
        if names.is_empty() {
            bail!("SSH key '{requested}' not found. No SSH keys are registered; add one at {SSH_KEYS_URL}");
        }
        bail!(
            "SSH key '{requested}' not found. Registered keys: {}",
            names.join(", ")
        );
    }

    if names.is_empty() {
        bail!("No SSH keys found. Add one at {SSH_KEYS_URL}");
    }
    if let [only] = names.as_slice() {
        return Ok(KeyChoice::Use(only.clone()));
    }
    Ok(KeyChoice::Pick(names))
}

/// Narrow `All` to the instances the user was shown, so nothing launched
/// after the confirmation prompt is terminated without being confirmed.
fn confirmed_target(target: TerminationTarget, shown: &[Instance]) -> TerminationTarget {
    match target {
        TerminationTarget::All => {
            TerminationTarget::Ids(shown.iter().map(|i| i.id.clone()).collect())
        }
        ids @ TerminationTarget::Ids(_) => ids,
    }
}

/// Lambda Cloud operations against one provider.
pub struct App {
    provider: Arc<dyn GpuProvider>,
    interrupts: InterruptRouter,
}

impl App {
    /// Create the app. `interrupts` receives Ctrl+C while a retry loop runs.
    #[must_use]
    pub fn new(provider: Arc<dyn GpuProvider>, interrupts: InterruptRouter) -> Self {
        Self {
            provider,
            interrupts,
        }
    }

    /// Provider handle.
    #[must_use]
    pub fn provider(&self) -> Arc<dyn GpuProvider> {
        Arc::clone(&self.provider)
    }

    /// Print running instances.
    ///
    /// # Errors
    /// Returns error if the listing fails.
    pub async fn list_instances(&self) -> Result<Vec<Instance>> {
        let instances = self
            .provider
            .list_instances()
            .await
            .context("Failed to list instances")?;
        ui::print_instances(&instances);
        Ok(instances)
    }

    /// Print instance types with their availability.
    ///
    /// # Errors
    /// Returns error if the inventory cannot be fetched.
    pub async fn list_types(&self, filter: Option<&str>, show: AvailabilityFilter) -> Result<()> {
        let mut inventory = InventoryModel::new(self.provider());
        let types = inventory
            .refresh()
            .await
            .context("Failed to fetch instance types")?;
        ui::print_instance_types(types, filter, show);
        Ok(())
    }

    /// Print the account's SSH keys.
    ///
    /// # Errors
    /// Returns error if the listing fails.
    pub async fn list_ssh_keys(&self) -> Result<()> {
        let keys = self
            .provider
            .list_ssh_keys()
            .await
            .context("Failed to list SSH keys")?;

        if keys.is_empty() {
            print_warning("No SSH keys found.");
            print_hint(&format!("Add one at {SSH_KEYS_URL}"));
            return Ok(());
        }

        print_section("SSH KEYS");
        for key in &keys {
            println!("  {} {}", key.name.bold(), format!("(ID: {})", key.id).bright_black());
        }
        Ok(())
    }

    /// Launch instances, once or with retries.
    ///
    /// # Errors
    /// Returns error when the launch does not succeed, except for a user
    /// cancellation which is reported and treated as success.
    pub async fn launch(&self, options: LaunchOptions) -> Result<()> {
        let mut wait = options.wait;

        let instance_type = match options.instance_type {
            Some(t) => t,
            None => {
                let mut inventory = InventoryModel::new(self.provider());
                inventory
                    .refresh()
                    .await
                    .context("Failed to fetch instance types")?;
                let Some(selected) = prompt::select_instance_type(&inventory, options.show_all)?
                else {
                    print_info("Launch cancelled.");
                    return Ok(());
                };
                if !wait && !inventory.is_available(&selected, options.region.as_deref()) {
                    print_warning("Instance type is not currently available. Enabling auto-retry mode.");
                    wait = true;
                }
                selected
            }
        };

        let Some(ssh_key) = self.resolve_ssh_key(options.ssh_key.as_deref()).await? else {
            print_info("Launch cancelled.");
            return Ok(());
        };

        let mut request = LaunchRequest::new(instance_type)
            .ssh_key(ssh_key)
            .quantity(options.quantity);
        if let Some(region) = options.region {
            request = request.region(region);
        }
        if let Some(name) = options.name {
            request = request.name(name);
        }

        let coordinator = LaunchCoordinator::new(self.provider());
        if wait {
            self.launch_with_retry(coordinator, request, options.policy)
                .await
        } else {
            Self::launch_once(coordinator, &request).await
        }
    }

    async fn resolve_ssh_key(&self, requested: Option<&str>) -> Result<Option<String>> {
        let keys = self
            .provider
            .list_ssh_keys()
            .await
            .context("Failed to list SSH keys")?;

        match choose_ssh_key(&keys, requested)? {
            KeyChoice::Use(name) => {
                if requested.is_none() {
                    print_info(&format!("Using SSH key: {name}"));
                }
                Ok(Some(name))
            }
            KeyChoice::Pick(names) => prompt::select_ssh_key(&names),
        }
    }

    async fn launch_once(mut coordinator: LaunchCoordinator, request: &LaunchRequest) -> Result<()> {
        print_info(&format!(
            "Checking availability for '{}'...",
            request.instance_type
        ));

        match coordinator.attempt_launch(request).await {
            LaunchOutcome::Launched {
                region,
                instance_ids,
            } => {
                print_launched(&region, &instance_ids);
                print_hint("Run `lambda list` to see them once they are active.");
                Ok(())
            }
            LaunchOutcome::Unavailable { reason } => {
                print_hint("Use --wait to keep retrying until capacity appears.");
                bail!("{reason}")
            }
            LaunchOutcome::Failed { error } => Err(error).context("Launch failed"),
        }
    }

    async fn launch_with_retry(
        &self,
        coordinator: LaunchCoordinator,
        request: LaunchRequest,
        policy: RetryPolicy,
    ) -> Result<()> {
        print_section(&format!(
            "Waiting for capacity: {}",
            request.instance_type
        ));
        println!("  Retry interval: {}", format_elapsed(policy.interval));
        match policy.max_retries {
            Some(max) => println!("  Max attempts:   {max}"),
            None => println!("  Max attempts:   unlimited"),
        }
        print_hint("Press Ctrl+C to stop retrying.");
        println!();

        let handle = RetryEngine::new(coordinator, policy).spawn(request, ConsoleObserver::new());
        let route = self.interrupts.route_to(handle.cancellation_token());
        let outcome = handle.join().await.context("Retry loop stopped unexpectedly")?;
        drop(route);

        match outcome {
            RetryOutcome::Succeeded {
                region,
                instance_ids,
                attempts,
                elapsed,
            } => {
                print_launched(&region, &instance_ids);
                print_hint(&format!(
                    "Took {attempts} attempt(s) over {}.",
                    format_elapsed(elapsed)
                ));
                Ok(())
            }
            RetryOutcome::Cancelled { attempts, elapsed } => {
                println!();
                print_warning(&format!(
                    "Cancelled after {attempts} attempt(s) ({}).",
                    format_elapsed(elapsed)
                ));
                Ok(())
            }
            RetryOutcome::Exhausted {
                attempts,
                last_reason,
                ..
            } => bail!("No capacity after {attempts} attempt(s): {last_reason}"),
            RetryOutcome::Aborted { error, attempts } => {
                Err(error).context(format!("Launch failed on attempt {attempts}"))
            }
        }
    }

    /// Terminate instances after confirmation.
    ///
    /// # Errors
    /// Returns error if listing fails or any instance could not be terminated.
    pub async fn terminate(&self, target: TerminationTarget, force: bool) -> Result<()> {
        if matches!(&target, TerminationTarget::Ids(ids) if ids.is_empty()) {
            bail!("Specify instance IDs to terminate, or `all`");
        }

        let instances = self
            .provider
            .list_instances()
            .await
            .context("Failed to list instances")?;

        let count = match &target {
            TerminationTarget::All => {
                if instances.is_empty() {
                    print_info("No running instances to terminate.");
                    return Ok(());
                }
                print_section("INSTANCES TO TERMINATE");
                for instance in &instances {
                    println!("  {}", ui::format_instance_line(instance));
                }
                instances.len()
            }
            TerminationTarget::Ids(ids) => {
                print_section("INSTANCES TO TERMINATE");
                for id in ids {
                    match instances.iter().find(|i| &i.id == id) {
                        Some(instance) => println!("  {}", ui::format_instance_line(instance)),
                        None => println!("  {id}  {}", "(not in running instances)".bright_black()),
                    }
                }
                ids.len()
            }
        };

        if !force
            && !prompt::confirm(
                &format!("Terminate {count} instance(s)? This cannot be undone"),
                false,
            )?
        {
            print_info("Termination cancelled.");
            return Ok(());
        }
        let target = if force {
            target
        } else {
            confirmed_target(target, &instances)
        };

        let results = TerminationCoordinator::new(self.provider())
            .terminate(target)
            .await
            .context("Failed to resolve instances to terminate")?;
        print_termination_results(&results);

        let failed = results.iter().filter(|r| !r.is_terminated()).count();
        if failed > 0 {
            bail!("{failed} instance(s) could not be terminated");
        }
        Ok(())
    }

    /// Add an SSH config entry for an instance.
    ///
    /// Without `id` the instance and alias are picked interactively.
    ///
    /// # Errors
    /// Returns error if the instance is unknown, has no IP, or the file cannot be written.
    pub async fn ssh_config_add(&self, id: Option<&str>, alias: Option<String>) -> Result<()> {
        let instances = self
            .provider
            .list_instances()
            .await
            .context("Failed to list instances")?;

        let (instance, alias) = match id {
            Some(id) => {
                let instance = instances
                    .iter()
                    .find(|i| i.id == id || i.id.starts_with(id))
                    .with_context(|| format!("Instance '{id}' not found"))?;
                (instance, alias)
            }
            None => {
                if instances.is_empty() {
                    print_info("No running instances found.");
                    return Ok(());
                }
                let Some(instance) = prompt::select_instance(&instances, "Select instance")? else {
                    return Ok(());
                };
                let alias = match alias {
                    Some(alias) => alias,
                    None => prompt::input("Host alias", &SshConfig::default_alias(instance))?,
                };
                (instance, Some(alias))
            }
        };

        let config = SshConfig::user_default()?;
        let alias = config.add(instance, alias.as_deref())?;
        print_success(&format!(
            "Added '{alias}' to {}",
            config.path().display()
        ));
        print_hint(&format!("Connect with: ssh {alias}"));
        Ok(())
    }

    /// Remove every managed SSH config entry.
    ///
    /// # Errors
    /// Returns error if the file cannot be rewritten.
    #[allow(clippy::unused_self)]
    pub fn ssh_config_remove(&self, force: bool) -> Result<()> {
        let config = SshConfig::user_default()?;
        if !force
            && !prompt::confirm(
                &format!(
                    "Remove all Lambda Cloud entries from {}?",
                    config.path().display()
                ),
                true,
            )?
        {
            return Ok(());
        }

        match config.remove_all()? {
            0 => print_info("No Lambda Cloud entries found."),
            removed => print_success(&format!("Removed {removed} entry(ies)")),
        }
        Ok(())
    }
}
