use anyhow::{Context, Result, bail};
use std::io::{self, BufRead, IsTerminal};
use std::path::PathBuf;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Where the passphrase comes from, as selected by `-P` or
/// `--passphrase method:arg`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassphraseEntry {
    /// Terminal if there is one, standard input otherwise.
    TtyStdin,
    /// Standard input, one line, no confirmation.
    StdinOnce,
    /// Terminal only, no confirmation.
    TtyOnce,
    /// The named environment variable.
    Env(String),
    /// The first line of the named file.
    File(PathBuf),
}

impl FromStr for PassphraseEntry {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("dev", "tty-stdin")) => Ok(PassphraseEntry::TtyStdin),
            Some(("dev", "stdin-once")) => Ok(PassphraseEntry::StdinOnce),
            Some(("dev", "tty-once")) => Ok(PassphraseEntry::TtyOnce),
            Some(("env", name)) => Ok(PassphraseEntry::Env(name.to_string())),
            Some(("file", path)) => Ok(PassphraseEntry::File(PathBuf::from(path))),
            _ => Err(()),
        }
    }
}

/// Reads the passphrase from the selected source.
///
/// `confirm` requests a second entry and a match check; only the default
/// `dev:tty-stdin` method honors it, the "once" methods and the
/// non-interactive sources never confirm.
pub fn read_passphrase(entry: &PassphraseEntry, confirm: bool) -> Result<Zeroizing<String>> {
    match entry {
        PassphraseEntry::TtyStdin => {
            if io::stdin().is_terminal() {
                prompt_terminal(confirm)
            } else {
                read_stdin(confirm)
            }
        }
        PassphraseEntry::StdinOnce => {
            if io::stdin().is_terminal() {
                prompt_terminal(false)
            } else {
                read_stdin(false)
            }
        }
        PassphraseEntry::TtyOnce => prompt_terminal(false),
        PassphraseEntry::Env(name) => match std::env::var(name) {
            Ok(pw) => Ok(Zeroizing::new(pw)),
            Err(_) => bail!("Failed to read from ${{{name}}}"),
        },
        PassphraseEntry::File(path) => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("Cannot open passphrase file: {}", path.display()))?;
            let mut line = Zeroizing::new(String::new());
            io::BufReader::new(file)
                .read_line(&mut line)
                .with_context(|| format!("Cannot read passphrase file: {}", path.display()))?;
            trim_newline(&mut line);
            Ok(line)
        }
    }
}

fn prompt_terminal(confirm: bool) -> Result<Zeroizing<String>> {
    let pw = Zeroizing::new(
        rpassword::prompt_password("Please enter passphrase: ")
            .context("Cannot read passphrase from terminal")?,
    );

    if confirm {
        let again = Zeroizing::new(
            rpassword::prompt_password("Please confirm passphrase: ")
                .context("Cannot read passphrase from terminal")?,
        );
        if *pw != *again {
            bail!("Passphrases mismatch");
        }
    }

    Ok(pw)
}

fn read_stdin(confirm: bool) -> Result<Zeroizing<String>> {
    let stdin = io::stdin();
    let mut handle = stdin.lock();

    let mut pw = Zeroizing::new(String::new());
    handle.read_line(&mut pw)?;
    trim_newline(&mut pw);

    if confirm {
        let mut again = Zeroizing::new(String::new());
        handle.read_line(&mut again)?;
        trim_newline(&mut again);

        if *pw != *again {
            bail!("Passphrases mismatch");
        }
    }

    Ok(pw)
}

/// Strips one trailing newline, tolerating CRLF.
fn trim_newline(s: &mut String) {
    if s.ends_with('\n') {
        s.pop();
        if s.ends_with('\r') {
            s.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn methods_parse() {
        assert_eq!(
            "dev:tty-stdin".parse(),
            Ok(PassphraseEntry::TtyStdin)
        );
        assert_eq!(
            "dev:stdin-once".parse(),
            Ok(PassphraseEntry::StdinOnce)
        );
        assert_eq!("dev:tty-once".parse(), Ok(PassphraseEntry::TtyOnce));
        assert_eq!(
            "env:MY_SECRET".parse(),
            Ok(PassphraseEntry::Env("MY_SECRET".to_string()))
        );
        assert_eq!(
            "file:/tmp/pw".parse(),
            Ok(PassphraseEntry::File(PathBuf::from("/tmp/pw")))
        );
    }

    #[test]
    fn malformed_methods_fail() {
        assert_eq!(
            "dev:tty".parse::<PassphraseEntry>(),
            Err(())
        );
        assert_eq!("stdin-once".parse::<PassphraseEntry>(), Err(()));
        assert_eq!("".parse::<PassphraseEntry>(), Err(()));
    }

    #[test]
    fn env_method_reads_variable() {
        // SAFETY: test-local variable name, no concurrent reader cares.
        unsafe { std::env::set_var("SCRYPT_AUTH_TEST_PW", "sekrit") };
        let pw = read_passphrase(
            &PassphraseEntry::Env("SCRYPT_AUTH_TEST_PW".to_string()),
            false,
        )
        .unwrap();

        assert_eq!(&*pw, "sekrit");
    }

    #[test]
    fn missing_env_variable_fails() {
        let err = read_passphrase(
            &PassphraseEntry::Env("SCRYPT_AUTH_TEST_UNSET".to_string()),
            false,
        )
        .unwrap_err();

        assert!(err.to_string().contains("SCRYPT_AUTH_TEST_UNSET"));
    }

    #[test]
    fn file_method_reads_first_line() {
        use std::io::Write;

        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "first line").unwrap();
        writeln!(tmp, "second line").unwrap();

        let pw = read_passphrase(
            &PassphraseEntry::File(tmp.path().to_path_buf()),
            false,
        )
        .unwrap();

        assert_eq!(&*pw, "first line");
    }

    #[test]
    fn trim_strips_one_newline() {
        let mut s = String::from("pw\n");
        trim_newline(&mut s);
        assert_eq!(s, "pw");

        let mut s = String::from("pw\r\n");
        trim_newline(&mut s);
        assert_eq!(s, "pw");

        // Only the final newline goes; embedded ones are part of the pass.
        let mut s = String::from("pw\n\n");
        trim_newline(&mut s);
        assert_eq!(s, "pw\n");
    }
}
