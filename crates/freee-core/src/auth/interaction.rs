use std::io;

use url::Url;

/// Human-facing capabilities needed by the authorization flow and company selection.
///
/// Both calls may block for as long as the person at the keyboard needs.
pub trait Interaction {
    /// Show `message` and return the line the user typed, without the trailing newline.
    fn prompt(&mut self, message: &str) -> io::Result<String>;

    /// Present `url` to the user, opening a browser where possible.
    fn open_url(&mut self, url: &Url) -> io::Result<()>;
}
