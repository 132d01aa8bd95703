// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host UI surface the core drives but does not render.

/// Operations the core needs from the hosting UI.
pub trait HostUi: Send + Sync {
    /// Bring the host window to the front.
    fn show_window(&self);
    /// Switch the host to the environments page.
    fn show_environments_page(&self);
    /// Ask the user to select an organization.
    fn show_organization_page(&self);
    /// Open a URL in an external browser.
    fn open_url(&self, url: &str);
    /// Ask the host to connect the IDE once the environment becomes active.
    fn set_auto_connect(&self, environment_id: &str);
    /// Surface a user-visible error.
    fn report_error(&self, message: &str);
}

/// Headless UI: opens the system browser and logs everything else.
#[derive(Debug, Default)]
pub struct SystemUi;

impl HostUi for SystemUi {
    fn show_window(&self) {
        tracing::debug!("show window");
    }

    fn show_environments_page(&self) {
        tracing::debug!("show environments page");
    }

    fn show_organization_page(&self) {
        tracing::info!("select an organization to list workspaces");
    }

    fn open_url(&self, url: &str) {
        if let Err(e) = open::that(url) {
            tracing::warn!(err = %e, "failed to open browser, visit the URL manually: {url}");
        }
    }

    fn set_auto_connect(&self, environment_id: &str) {
        tracing::info!(environment = %environment_id, "auto-connect when environment is ready");
    }

    fn report_error(&self, message: &str) {
        tracing::error!("{message}");
    }
}
