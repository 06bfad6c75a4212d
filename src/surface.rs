//! Synthetic input surface for driving external application windows.
//!
//! There is exactly one physical input surface (the machine's pointer and
//! keyboard), shared by every target window. The `InjectionChannel` wraps
//! calls to this module in a global exclusive lock; this module itself only
//! knows how to perform the individual steps and to report failures as
//! ordinary errors.

use std::process::Command;

use crate::coords::CoordinateBinding;
use crate::{hlog_debug, hlog_trace, hlog_warn, Error, Result};

/// The steps the injection channel composes into one delivery.
///
/// Implemented by `XdoSurface` in production; tests substitute scripted
/// fakes.
pub trait InputSurface: Send + Sync + 'static {
    /// Bring the target window into focus.
    fn focus_window(&self, window: &str) -> Result<()>;

    /// Move the pointer to the input region and click to place the caret.
    fn move_and_click(&self, binding: &CoordinateBinding) -> Result<()>;

    /// Type the message body into the focused input region.
    fn type_text(&self, text: &str) -> Result<()>;

    /// Submit normally (appended behind whatever the window already has
    /// pending).
    fn submit(&self) -> Result<()>;

    /// Submit with the priority key combination, processed ahead of input
    /// already pending in the window.
    fn submit_bypass(&self) -> Result<()>;
}

/// Input surface backed by the `xdotool` command-line tool.
pub struct XdoSurface;

impl XdoSurface {
    pub fn is_available() -> bool {
        which::which("xdotool").is_ok()
    }

    pub fn version() -> Result<String> {
        let output = Command::new("xdotool").arg("version").output()?;
        if !output.status.success() {
            return Err(Error::Surface("Failed to get xdotool version".to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn run(&self, args: &[&str]) -> Result<()> {
        hlog_trace!("xdotool {}", args.join(" "));
        let output = Command::new("xdotool").args(args).output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            hlog_warn!("xdotool {} failed: {}", args[0], stderr);
            return Err(Error::TargetUnreachable(format!(
                "xdotool {} failed: {}",
                args[0],
                stderr.trim()
            )));
        }
        Ok(())
    }

    /// Resolve a window identifier to an X window id.
    ///
    /// A window that moved away or was closed resolves to nothing; that is
    /// the stale-coordinate case and reported as unreachable.
    fn resolve_window(&self, window: &str) -> Result<String> {
        let output = Command::new("xdotool")
            .args(["search", "--name", window])
            .output()?;
        if !output.status.success() {
            return Err(Error::TargetUnreachable(format!(
                "Window not found: {}",
                window
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let id = stdout
            .lines()
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::TargetUnreachable(format!("Window not found: {}", window)))?;
        Ok(id.to_string())
    }
}

impl InputSurface for XdoSurface {
    fn focus_window(&self, window: &str) -> Result<()> {
        hlog_debug!("XdoSurface::focus_window window={}", window);
        let id = self.resolve_window(window)?;
        self.run(&["windowactivate", "--sync", &id])
    }

    fn move_and_click(&self, binding: &CoordinateBinding) -> Result<()> {
        hlog_debug!(
            "XdoSurface::move_and_click x={} y={} window={}",
            binding.x,
            binding.y,
            binding.window
        );
        let x = binding.x.to_string();
        let y = binding.y.to_string();
        self.run(&["mousemove", "--sync", &x, &y])?;
        self.run(&["click", "1"])
    }

    fn type_text(&self, text: &str) -> Result<()> {
        hlog_trace!("XdoSurface::type_text len={}", text.len());
        // --clearmodifiers prevents a held modifier from corrupting the text
        self.run(&["type", "--clearmodifiers", "--delay", "12", text])
    }

    fn submit(&self) -> Result<()> {
        self.run(&["key", "--clearmodifiers", "Return"])
    }

    fn submit_bypass(&self) -> Result<()> {
        // ctrl+Return is the priority sequence the target application
        // processes ahead of queued input.
        self.run(&["key", "--clearmodifiers", "ctrl+Return"])
    }
}
