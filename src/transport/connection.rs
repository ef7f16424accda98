//! Per-connection handshake and load-result loop.

use std::io::{self, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream};

use injector_protocol::{
    handshake_status, read_frame, read_payload, read_string, read_word, write_word, ClientKind,
    FrameHeader, ProtocolError, MAX_PATH_LENGTH, PARAMETER_COUNT,
};
use tracing::{debug, info, warn};

use super::client::{ClientHandle, ClientInfo};
use super::{EventSink, ServerEvent, TransportResult};
use crate::ui::Ui;

pub(crate) struct ConnectionContext {
    pub client: ClientHandle,
    pub ui: Ui,
    pub events: EventSink,
}

pub(crate) fn serve_connection(stream: TcpStream, context: &ConnectionContext) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    match handshake(&stream, context) {
        Ok(Some((generation, reader))) => serve_load_results(reader, generation, context),
        Ok(None) => debug!(%peer, "connection rejected"),
        Err(e) => {
            warn!(%peer, error = %e, "handshake failed");
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

/// Returns the session generation and the buffered reader, or `None` when
/// the opening magic was wrong and the socket has been closed.
fn handshake(
    stream: &TcpStream,
    context: &ConnectionContext,
) -> TransportResult<Option<(u64, BufReader<TcpStream>)>> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let magic = context.client.magic();

    let header = FrameHeader::read_from(&mut reader)?;
    if header.data_length != magic {
        let detail = format!("{} != {}", header.data_length, magic);
        warn!(%detail, "bogus connection attempt");
        context.ui.error("Bogus connection attempt", Some(&detail));
        let _ = stream.shutdown(Shutdown::Both);
        return Ok(None);
    }
    if header.path_length < 0 || header.path_length > MAX_PATH_LENGTH {
        return Err(ProtocolError::InvalidPathLength(header.path_length).into());
    }
    read_payload(&mut reader, header.path_length as usize)?;

    let mut writer = stream.try_clone()?;
    let status = handshake_status(context.ui.preferences().inject_storyboards);
    write_word(&mut writer, status)?;
    writer.flush()?;

    let executable = read_frame(&mut reader)?;
    let executable_path = executable.path;

    // older clients send no device root and put the arch length on the
    // executable frame itself
    let (device_root, arch_length) = if executable.header.data_length != 0 {
        (executable_path.clone(), executable.header.data_length)
    } else {
        loop {
            let frame = read_frame(&mut reader)?;
            if frame.header.data_length != 0 {
                break (frame.path, frame.header.data_length);
            }
        }
    };
    if arch_length < 0 || arch_length > MAX_PATH_LENGTH {
        return Err(ProtocolError::InvalidPayloadLength(arch_length).into());
    }
    let arch = read_string(&mut reader, arch_length as usize)?;

    let kind = match ClientKind::recognise(&executable_path) {
        Some(kind) => kind,
        None => {
            warn!(path = %executable_path, "unrecognised executable path, assuming simulator");
            context.ui.error(
                "Could not recognise executable path, assuming Simulator",
                Some(&executable_path),
            );
            ClientKind::Simulated
        }
    };

    let info = ClientInfo {
        arch,
        kind,
        executable_path,
        device_root,
    };
    let generation = context.client.attach(writer, info.clone());
    info!(arch = %info.arch, kind = %info.kind, generation, "client connected");
    (context.events)(ServerEvent::ClientConnected { generation, info });

    for (index, value) in context
        .ui
        .parameters()
        .iter()
        .enumerate()
        .take(PARAMETER_COUNT)
    {
        // a failed write closes the socket; the read loop then detaches
        if let Err(e) = context.client.send(&format!("{}{}", index, value), None) {
            warn!(error = %e, "could not replay parameters");
            break;
        }
    }

    Ok(Some((generation, reader)))
}

fn serve_load_results(mut reader: BufReader<TcpStream>, generation: u64, context: &ConnectionContext) {
    loop {
        let word = match read_word(&mut reader) {
            Ok(word) => word,
            Err(ProtocolError::Closed) => break,
            Err(e) => {
                warn!(error = %e, generation, "read from client failed");
                break;
            }
        };

        match context.client.take_download(generation) {
            Some(mut file) => {
                let length = u64::try_from(word).unwrap_or(0);
                match io::copy(&mut (&mut reader).take(length), &mut file) {
                    Ok(copied) if copied == length => {
                        debug!(bytes = copied, "download from client complete")
                    }
                    Ok(copied) => {
                        warn!(expected = length, copied, "download from client truncated");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "download from client failed");
                        break;
                    }
                }
            }
            None => {
                debug!(word, generation, "load result");
                (context.events)(ServerEvent::BundleLoaded {
                    generation,
                    success: word != 0,
                });
            }
        }
    }

    if context.client.detach(generation) {
        info!(generation, "client disconnected");
        (context.events)(ServerEvent::ClientDisconnected { generation });
    }
}
