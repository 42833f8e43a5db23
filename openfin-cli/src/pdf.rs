//! PDF decrypt/paginate utility.

use anyhow::{bail, Context, Result};
use openfin_ingest::unit_file_name;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

pub trait PdfTool: Send + Sync {
    /// Write an unencrypted copy of `input` into `out_dir` and return its path.
    fn decrypt(&self, input: &Path, password: Option<&str>, out_dir: &Path) -> Result<PathBuf>;

    /// Split `input` into units of `unit_size` pages named `<stem>_chunk_<n>.pdf`
    /// inside `out_dir`.
    fn paginate(&self, input: &Path, unit_size: u32, out_dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Shells out to `qpdf`.
pub struct QpdfTool {
    command: PathBuf,
}

// qpdf exits 3 when it succeeded with warnings.
const QPDF_WARNINGS: i32 = 3;

impl QpdfTool {
    pub fn locate(command: &str) -> Result<Self> {
        let command = which::which(command)
            .with_context(|| format!("`{command}` not found on PATH (install qpdf or set [pdf].qpdf_command)"))?;
        Ok(Self { command })
    }

    /// Run qpdf; `stdin` is fed to the child and then closed.
    fn run(&self, args: Vec<OsString>, stdin: Option<&str>) -> Result<()> {
        let mut child = Command::new(&self.command)
            .args(&args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("running {}", self.command.display()))?;

        if let Some(text) = stdin {
            let mut pipe = child.stdin.take().context("qpdf stdin not captured")?;
            writeln!(pipe, "{text}").context("writing to qpdf stdin")?;
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("running {}", self.command.display()))?;

        match output.status.code() {
            Some(0) => Ok(()),
            Some(QPDF_WARNINGS) => {
                debug!(stderr = %String::from_utf8_lossy(&output.stderr).trim(), "qpdf warnings");
                Ok(())
            }
            _ => bail!(
                "qpdf failed with status {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
    }
}

fn file_stem(path: &Path) -> Result<&str> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("no usable file name in {}", path.display()))
}

impl PdfTool for QpdfTool {
    fn decrypt(&self, input: &Path, password: Option<&str>, out_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;
        let output = out_dir.join(format!("{}_decrypted.pdf", file_stem(input)?));

        // The password goes through stdin so it never shows up in the process list.
        let mut args: Vec<OsString> = vec!["--decrypt".into()];
        if password.is_some() {
            args.push("--password-file=-".into());
        }
        args.push(input.into());
        args.push(output.clone().into());

        self.run(args, password)
            .with_context(|| format!("decrypting {}", input.display()))?;
        Ok(output)
    }

    fn paginate(&self, input: &Path, unit_size: u32, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let stem = file_stem(input)?;
        let stem = stem.strip_suffix("_decrypted").unwrap_or(stem);
        let split_dir = out_dir.join("split");
        fs::create_dir_all(&split_dir).with_context(|| format!("create {}", split_dir.display()))?;

        self.run(
            vec![
                format!("--split-pages={}", unit_size.max(1)).into(),
                input.into(),
                split_dir.join("page.pdf").into(),
            ],
            None,
        )
        .with_context(|| format!("paginating {}", input.display()))?;

        // qpdf zero-pads the page numbers it appends, so name order is page order.
        let mut pieces = fs::read_dir(&split_dir)
            .with_context(|| format!("read {}", split_dir.display()))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        pieces.retain(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdf")));
        pieces.sort();

        let mut units = Vec::with_capacity(pieces.len());
        for (i, piece) in pieces.iter().enumerate() {
            let unit = out_dir.join(unit_file_name(stem, i as u32 + 1));
            fs::rename(piece, &unit)
                .with_context(|| format!("move {} to {}", piece.display(), unit.display()))?;
            units.push(unit);
        }
        fs::remove_dir(&split_dir).ok();

        debug!(units = units.len(), unit_size, "paginated");
        Ok(units)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    // Stands in for qpdf: records its argv, checks the password read from
    // stdin and splits into three pieces.
    const FAKE_QPDF: &str = r#"#!/bin/sh
printf '%s\n' "$@" >> "$(dirname "$0")/argv.txt"
case "$1" in
  --decrypt)
    read -r pw
    if [ "$2" != "--password-file=-" ] || [ "$pw" != "1234" ]; then echo "invalid password" >&2; exit 2; fi
    cp "$3" "$4" ;;
  --split-pages=*)
    dir=$(dirname "$3")
    for n in 03 01 02; do printf '%s' "$n" > "$dir/page-$n.pdf"; done ;;
esac
"#;

    fn fake_qpdf(dir: &Path) -> QpdfTool {
        let script = dir.join("qpdf");
        fs::write(&script, FAKE_QPDF).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        QpdfTool::locate(script.to_str().unwrap()).unwrap()
    }

    #[test]
    fn test_locate_missing_command() {
        assert!(QpdfTool::locate("openfin-no-such-qpdf").is_err());
    }

    #[test]
    fn test_decrypt_then_paginate_names_units() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_qpdf(dir.path());
        let input = dir.path().join("Nu_2025-06-12.pdf");
        fs::write(&input, b"%PDF").unwrap();

        let out = dir.path().join("work");
        let decrypted = tool.decrypt(&input, Some("1234"), &out).unwrap();
        assert_eq!(decrypted, out.join("Nu_2025-06-12_decrypted.pdf"));

        let units = tool.paginate(&decrypted, 1, &out.join("units")).unwrap();
        let names: Vec<String> = units
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["Nu_2025-06-12_chunk_1.pdf", "Nu_2025-06-12_chunk_2.pdf", "Nu_2025-06-12_chunk_3.pdf"]
        );
        assert_eq!(fs::read_to_string(&units[0]).unwrap(), "01");
        assert_eq!(fs::read_to_string(&units[2]).unwrap(), "03");
    }

    #[test]
    fn test_wrong_password_reports_qpdf_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_qpdf(dir.path());
        let input = dir.path().join("statement.pdf");
        fs::write(&input, b"%PDF").unwrap();

        let err = tool.decrypt(&input, Some("0000"), &dir.path().join("work")).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("invalid password"), "{msg}");
        assert!(!msg.contains("0000"));
    }

    #[test]
    fn test_password_is_not_passed_on_command_line() {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_qpdf(dir.path());
        let input = dir.path().join("statement.pdf");
        fs::write(&input, b"%PDF").unwrap();

        tool.decrypt(&input, Some("1234"), &dir.path().join("work")).unwrap();

        let argv = fs::read_to_string(dir.path().join("argv.txt")).unwrap();
        assert!(argv.lines().any(|a| a == "--password-file=-"), "{argv}");
        assert!(!argv.contains("1234"), "{argv}");
    }
}
