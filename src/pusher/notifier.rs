use super::errors::NotifyError;
use log::{debug, info, warn};
use notify_rust::Notification;
use std::process::Command;

/// How a notification reached the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Native,
    Fallback,
    Suppressed,
}

pub trait Notifier {
    fn notify(&self, title: &str, message: &str) -> Result<Delivery, NotifyError>;
}

impl<T: Notifier + ?Sized> Notifier for &T {
    fn notify(&self, title: &str, message: &str) -> Result<Delivery, NotifyError> {
        (**self).notify(title, message)
    }
}

/// Sends one notification; `Err` carries the reason it was not shown.
type Sender = fn(&str, &str) -> Result<(), String>;

/// Desktop notifications: the native API first, then the platform's
/// command-line notifier.
#[derive(Clone, Copy)]
pub struct DesktopNotifier {
    native: Sender,
    fallback: Sender,
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self {
            native: show_native,
            fallback: run_fallback_command,
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<Delivery, NotifyError> {
        let native = match (self.native)(title, message) {
            Ok(()) => return Ok(Delivery::Native),
            Err(reason) => {
                debug!("Native notification failed: {reason}");
                reason
            }
        };
        let fallback = match (self.fallback)(title, message) {
            Ok(()) => return Ok(Delivery::Fallback),
            Err(reason) => reason,
        };

        let error = NotifyError::Undelivered { native, fallback };
        warn!("Notification error: {error}");
        Err(error)
    }
}

fn show_native(title: &str, message: &str) -> Result<(), String> {
    Notification::new()
        .summary(title)
        .body(message)
        .show()
        .map(|_| ())
        .map_err(|error| error.to_string())
}

fn run_fallback_command(title: &str, message: &str) -> Result<(), String> {
    match fallback_command(title, message).output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(output) => Err(format!(
            "{}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )),
        Err(error) => Err(error.to_string()),
    }
}

/// Logs instead of notifying.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<Delivery, NotifyError> {
        info!("[{title}] {message}");
        Ok(Delivery::Suppressed)
    }
}

#[cfg(target_os = "macos")]
fn fallback_command(title: &str, message: &str) -> Command {
    let script = format!(
        "display notification {} with title {}",
        applescript_string(message),
        applescript_string(title)
    );
    let mut command = Command::new("osascript");
    command.arg("-e").arg(script);
    command
}

#[cfg(not(target_os = "macos"))]
fn fallback_command(title: &str, message: &str) -> Command {
    let mut command = Command::new("notify-send");
    command.arg(title).arg(message);
    command
}

/// Quotes `text` as an AppleScript string literal.
#[cfg(any(target_os = "macos", test))]
fn applescript_string(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
