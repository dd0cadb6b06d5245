use std::io::{self, BufRead, Write};

use freee_core::auth::Interaction;
use url::Url;

/// Interaction backed by stdin/stdout and the system browser.
#[derive(Debug, Default)]
pub struct TerminalInteraction;

impl Interaction for TerminalInteraction {
    fn prompt(&mut self, message: &str) -> io::Result<String> {
        let mut stdout = io::stdout();
        write!(stdout, "{message}")?;
        stdout.flush()?;

        let mut input = String::new();
        if io::stdin().lock().read_line(&mut input)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "standard input closed",
            ));
        }
        Ok(input.trim_end_matches(['\r', '\n']).to_owned())
    }

    fn open_url(&mut self, url: &Url) -> io::Result<()> {
        println!("\nAuthorize the application by visiting:\n  {url}\n");
        println!("After approving, copy the authorization code shown and paste it below.");
        open::that(url.as_str())
    }
}
