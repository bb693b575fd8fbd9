//! `HighGUI` preview window.

use crate::Result;
use log::info;
use opencv::core::Mat;
use opencv::highgui::{self, WINDOW_NORMAL};

/// Keys that end the frame loop
const QUIT_KEYS: [i32; 2] = [27, b'q' as i32];

/// Named preview window
pub struct PreviewWindow {
    name: String,
}

impl PreviewWindow {
    /// Create the window
    ///
    /// # Errors
    ///
    /// Returns an error if `HighGUI` cannot create a window (e.g. no display).
    pub fn open(name: &str) -> Result<Self> {
        highgui::named_window(name, WINDOW_NORMAL)?;
        Ok(Self { name: name.to_string() })
    }

    /// Show a frame and poll the keyboard. Returns `true` if quit was pressed.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be shown.
    pub fn show(&self, frame: &Mat) -> Result<bool> {
        highgui::imshow(&self.name, frame)?;
        let key = highgui::wait_key(1)?;
        Ok(key >= 0 && QUIT_KEYS.contains(&(key & 0xFF)))
    }

    /// Destroy the window
    ///
    /// # Errors
    ///
    /// Returns an error if `HighGUI` fails to destroy it.
    pub fn close(self) -> Result<()> {
        highgui::destroy_window(&self.name)?;
        info!("Preview window closed");
        Ok(())
    }
}
