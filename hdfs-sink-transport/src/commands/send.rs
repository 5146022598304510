//! Send command: pump newline-delimited records through a transport.

use std::io::BufRead;

use hdfs_sink_fs::RemoteFilesystem;
use hdfs_sink_log::Logger;

use crate::config::TransportConfig;
use crate::transport::OutboundTransport;

use super::{CommandError, CommandResult};

/// Result of a send run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SendResult {
    /// Records written to the remote filesystem.
    pub records_sent: usize,
    /// Records the transport rejected.
    pub records_failed: usize,
    /// Blank lines skipped.
    pub blank_lines: usize,
    /// Address of the last file opened, if any.
    pub last_file: Option<String>,
    /// Sequence number of the last file opened, if any.
    pub last_sequence: Option<u64>,
}

/// Start a transport, send every non-blank line of `input` as one record
/// (newline-terminated), then stop the transport.
///
/// A record the transport rejects is counted and the run continues, so one
/// bad write does not drop the rest of the input.
pub fn execute_send<R, F, L>(
    config: TransportConfig,
    input: R,
    fs: F,
    logger: L,
) -> CommandResult<SendResult>
where
    R: BufRead,
    F: RemoteFilesystem + Clone,
    L: Logger + Clone,
{
    config.validate()?;
    logger.debug(&format!(
        "sending to {}:{}{} as {}",
        config.host,
        config.port,
        config.file_path,
        config.user_name.as_deref().unwrap_or("<default user>")
    ));

    let mut transport = OutboundTransport::new(fs, config, logger.clone());
    transport.start()?;

    let mut result = SendResult::default();
    for line in input.split(b'\n') {
        let mut record = match line {
            Ok(record) => record,
            Err(e) => {
                transport.stop();
                return Err(CommandError::Read(e));
            }
        };
        if record.last() == Some(&b'\r') {
            record.pop();
        }
        if record.iter().all(u8::is_ascii_whitespace) {
            result.blank_lines += 1;
            continue;
        }

        // Records are opaque bytes; no decoding happens here.
        record.push(b'\n');
        match transport.receive(&record) {
            Ok(()) => result.records_sent += 1,
            Err(_) => result.records_failed += 1,
        }
    }

    if let Some(writer) = transport.writer() {
        if let Some(address) = writer.current_address() {
            result.last_file = Some(address.to_string());
            result.last_sequence = Some(writer.file_sequence());
        }
    }
    transport.stop();

    logger.info(&format!(
        "sent {} records ({} failed)",
        result.records_sent, result.records_failed
    ));
    Ok(result)
}
