use std::fmt;
use std::process::Command;

use crate::types::Mode;

pub const TRANSFER_PROGRAM: &str = "rsync";

/// Any non-zero exit, partial transfers (23, 24) included, is a failure.
pub fn transfer_succeeded(code: i32) -> bool {
    code == 0
}

/// Fully resolved rsync argument vector, program first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCommand(pub(crate) Vec<String>);

impl TransferCommand {
    pub fn args(&self) -> &[String] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.clone()
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.0[0]);
        cmd.args(&self.0[1..]);
        cmd
    }
}

impl fmt::Display for TransferCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

/// The only place transfer direction is decided: backup copies
/// `source -> destination`, restore copies `destination -> source`.
pub fn build_transfer_command(
    source: &str,
    destination: &str,
    secure_channel: bool,
    mode: Mode,
) -> TransferCommand {
    let mut args = vec![
        TRANSFER_PROGRAM.to_string(),
        "-rlptD".to_string(),
        "--delete".to_string(),
        "--chown=0:0".to_string(),
    ];
    if secure_channel {
        args.push("-e".to_string());
        args.push("ssh".to_string());
    }
    let (from, to) = match mode {
        Mode::Backup => (source, destination),
        Mode::Restore => (destination, source),
    };
    args.push(from.to_string());
    args.push(to.to_string());
    TransferCommand(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn last_two(cmd: &TransferCommand) -> (&str, &str) {
        let args = cmd.args();
        (args[args.len() - 2].as_str(), args[args.len() - 1].as_str())
    }

    #[test]
    fn backup_copies_source_to_destination() {
        let cmd = build_transfer_command("/volumes/data/", "/destination/data/data/", false, Mode::Backup);
        assert_eq!(
            cmd.to_string(),
            "rsync -rlptD --delete --chown=0:0 /volumes/data/ /destination/data/data/"
        );
    }

    #[test]
    fn restore_only_swaps_the_endpoints() {
        for secure in [false, true] {
            let backup = build_transfer_command("/a/", "host:/b/", secure, Mode::Backup);
            let restore = build_transfer_command("/a/", "host:/b/", secure, Mode::Restore);
            assert_eq!(last_two(&backup), ("/a/", "host:/b/"));
            assert_eq!(last_two(&restore), ("host:/b/", "/a/"));
            let n = backup.args().len();
            assert_eq!(n, restore.args().len());
            assert_eq!(backup.args()[..n - 2], restore.args()[..n - 2]);
        }
    }

    #[test]
    fn secure_channel_tunnels_through_ssh() {
        let cmd = build_transfer_command("/volumes/data/", "nas:/data/", true, Mode::Backup);
        let args = cmd.args();
        let e = args.iter().position(|a| a == "-e").expect("-e present");
        assert_eq!(args[e + 1], "ssh");
    }

    #[test]
    fn only_a_clean_exit_is_success() {
        assert!(transfer_succeeded(0));
        assert!(!transfer_succeeded(24));
        assert!(!transfer_succeeded(23));
    }
}
