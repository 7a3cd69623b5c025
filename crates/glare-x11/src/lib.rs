use std::sync::Arc;

use glare_core::{
    BackendError, DisplayDescriptor, DisplayHandle, GammaBackend, Ramp, RampWriter, RAMP_SIZE,
};
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::randr::{ConnectionExt as RandrConnectionExt, GetOutputInfoReply};
use x11rb::protocol::xproto::{ConnectionExt as XprotoConnectionExt, Window};
use x11rb::rust_connection::RustConnection;

/// One X connection plus the root window of its screen
struct Session {
    conn: RustConnection,
    root: Window,
}

impl Session {
    fn connect() -> Result<Self, BackendError> {
        let (conn, screen_num) =
            RustConnection::connect(None).map_err(|e| BackendError::platform("connect", e))?;
        let root = conn.setup().roots[screen_num].root;
        let ver = conn
            .randr_query_version(1, 5)
            .map_err(|e| BackendError::platform("randr query version", e))?
            .reply()
            .map_err(|e| BackendError::platform("randr query version", e))?;
        debug!(major = ver.major_version, minor = ver.minor_version, "randr available");
        Ok(Self { conn, root })
    }

    fn gamma_size(&self, crtc: u32) -> Result<usize, BackendError> {
        let reply = self
            .conn
            .randr_get_crtc_gamma_size(crtc)
            .map_err(|e| BackendError::platform("get gamma size", e))?
            .reply()
            .map_err(|e| BackendError::platform("get gamma size", e))?;
        Ok(usize::from(reply.size))
    }

    fn read(&self, crtc: u32) -> Result<Ramp, BackendError> {
        let reply = self
            .conn
            .randr_get_crtc_gamma(crtc)
            .map_err(|e| BackendError::platform("get gamma", e))?
            .reply()
            .map_err(|e| BackendError::platform("get gamma", e))?;
        // the ramp model is monochrome; green carries most of the luminance
        collapse(&reply.green)
    }

    fn write(&self, crtc: u32, ramp: &Ramp) -> Result<(), BackendError> {
        let size = self.gamma_size(crtc)?;
        self.send(crtc, &expand(ramp, size)?)
    }

    /// Set all three channels to `table`, which must match the CRTC gamma size
    fn send(&self, crtc: u32, table: &[u16]) -> Result<(), BackendError> {
        self.conn
            .randr_set_crtc_gamma(crtc, table, table, table)
            .map_err(|e| BackendError::platform("set gamma", e))?
            .check()
            .map_err(|e| BackendError::platform("set gamma", e))
    }
}

/// An original ramp already expanded to its CRTC's gamma size
struct PreparedRamp {
    crtc: u32,
    source: Ramp,
    table: Vec<u16>,
}

/// Writer used from the fault path. Owns its own connection and only replays
/// the tables prepared when it was created: a restore is one set-gamma request
/// with no size query and no resampling.
struct RestoreSession {
    session: Session,
    prepared: Vec<PreparedRamp>,
}

impl RestoreSession {
    fn prepare(originals: &[(DisplayHandle, Ramp)]) -> Result<Self, BackendError> {
        let session = Session::connect()?;
        let prepared = originals
            .iter()
            .map(|(handle, ramp)| {
                let size = session.gamma_size(handle.0)?;
                Ok(PreparedRamp {
                    crtc: handle.0,
                    source: *ramp,
                    table: expand(ramp, size)?,
                })
            })
            .collect::<Result<Vec<_>, BackendError>>()?;
        debug!(crtcs = prepared.len(), "restore tables prepared");
        Ok(Self { session, prepared })
    }
}

impl RampWriter for RestoreSession {
    fn write_ramp(&self, handle: DisplayHandle, ramp: &Ramp) -> Result<(), BackendError> {
        let table = find_prepared(&self.prepared, handle.0, ramp)
            .ok_or(BackendError::Unprepared(handle.0))?;
        self.session.send(handle.0, table)
    }
}

fn find_prepared<'a>(prepared: &'a [PreparedRamp], crtc: u32, ramp: &Ramp) -> Option<&'a [u16]> {
    prepared
        .iter()
        .find(|p| p.crtc == crtc && p.source == *ramp)
        .map(|p| p.table.as_slice())
}

/// RandR CRTC gamma backend for the default X display
pub struct X11Backend {
    session: Session,
}

impl X11Backend {
    pub fn connect() -> Result<Self, BackendError> {
        Ok(Self {
            session: Session::connect()?,
        })
    }
}

impl RampWriter for X11Backend {
    fn write_ramp(&self, handle: DisplayHandle, ramp: &Ramp) -> Result<(), BackendError> {
        self.session.write(handle.0, ramp)
    }
}

impl GammaBackend for X11Backend {
    fn displays(&self) -> Result<Vec<DisplayDescriptor>, BackendError> {
        let conn = &self.session.conn;
        let window = self.session.root;

        let resources = conn
            .randr_get_screen_resources_current(window)
            .map_err(enumerate)?
            .reply()
            .map_err(enumerate)?;
        let primary = conn
            .randr_get_output_primary(window)
            .map_err(enumerate)?
            .reply()
            .map_err(enumerate)?
            .output;
        // Pre-fetch EDID atom id
        let edid_atom = conn
            .intern_atom(false, b"EDID")
            .map_err(enumerate)?
            .reply()
            .map_err(enumerate)?
            .atom;

        let mut list: Vec<DisplayDescriptor> = Vec::new();
        for output in resources.outputs {
            let info: GetOutputInfoReply = conn
                .randr_get_output_info(output, resources.config_timestamp)
                .map_err(enumerate)?
                .reply()
                .map_err(enumerate)?;
            if info.connection != x11rb::protocol::randr::Connection::CONNECTED
                || info.crtc == x11rb::NONE
            {
                continue;
            }
            let is_primary = output == primary;
            // mirrored outputs share a CRTC and therefore a ramp
            if let Some(existing) = list.iter_mut().find(|d| d.handle.0 == info.crtc) {
                existing.primary |= is_primary;
                continue;
            }
            let name = String::from_utf8_lossy(&info.name).to_string();
            let model = read_edid(conn, output, edid_atom).and_then(|edid| parse_edid_model(&edid));
            debug!(%name, crtc = info.crtc, ?model, "found output");
            list.push(DisplayDescriptor {
                handle: DisplayHandle(info.crtc),
                name,
                model,
                primary: is_primary,
            });
        }
        Ok(list)
    }

    fn read_ramp(&self, handle: DisplayHandle) -> Result<Ramp, BackendError> {
        self.session.read(handle.0)
    }

    fn restore_writer(
        &self,
        originals: &[(DisplayHandle, Ramp)],
    ) -> Result<Arc<dyn RampWriter>, BackendError> {
        Ok(Arc::new(RestoreSession::prepare(originals)?))
    }
}

fn enumerate(err: impl std::fmt::Display) -> BackendError {
    BackendError::platform("enumerate outputs", err)
}

fn read_edid(conn: &RustConnection, output: u32, edid_atom: u32) -> Option<Vec<u8>> {
    let prop = conn
        .randr_get_output_property(output, edid_atom, x11rb::NONE, 0, u32::MAX, false, false)
        .ok()?
        .reply()
        .ok()?;
    (prop.format == 8 && !prop.data.is_empty()).then_some(prop.data)
}

/// Monitor name from the EDID descriptor blocks, prefixed with the
/// manufacturer code when it decodes to three letters.
fn parse_edid_model(edid: &[u8]) -> Option<String> {
    if edid.len() < 128 {
        return None;
    }
    // Manufacturer ID: bytes 8-9 (big-endian, 5-bit letters)
    let mfg_id = u16::from_be_bytes([edid[8], edid[9]]);
    let letters = [
        (((mfg_id >> 10) & 0x1F) as u8 + 0x40) as char,
        (((mfg_id >> 5) & 0x1F) as u8 + 0x40) as char,
        ((mfg_id & 0x1F) as u8 + 0x40) as char,
    ];
    let mfg = letters
        .iter()
        .all(char::is_ascii_uppercase)
        .then(|| letters.iter().collect::<String>());

    // Descriptor blocks from 54 to 126 in 18-byte chunks; 0xFC is the monitor name
    let model = edid[54..126]
        .chunks_exact(18)
        .find(|block| block[0] == 0 && block[1] == 0 && block[3] == 0xFC)
        .map(|block| parse_descriptor_text(&block[5..18]))
        .filter(|text| !text.is_empty());

    match (mfg, model) {
        (Some(mfg), Some(model)) => Some(format!("{mfg} {model}")),
        (None, Some(model)) => Some(model),
        (Some(mfg), None) => Some(mfg),
        (None, None) => None,
    }
}

fn parse_descriptor_text(bytes: &[u8]) -> String {
    let s: Vec<u8> = bytes
        .iter()
        .copied()
        .take_while(|&b| b != 0x0A && b != 0x00)
        .collect();
    String::from_utf8_lossy(&s).trim().to_string()
}

/// Resample a 256-entry ramp to a CRTC gamma table of `size` entries
fn expand(ramp: &Ramp, size: usize) -> Result<Vec<u16>, BackendError> {
    if size < 2 {
        return Err(BackendError::UnsupportedSize(size));
    }
    if size == RAMP_SIZE {
        return Ok(ramp.entries().to_vec());
    }
    let last = (RAMP_SIZE - 1) as f64;
    Ok((0..size)
        .map(|j| sample(ramp.entries(), j as f64 * last / (size - 1) as f64))
        .collect())
}

/// Resample a CRTC gamma table of any size down to 256 entries
fn collapse(channel: &[u16]) -> Result<Ramp, BackendError> {
    let size = channel.len();
    if size < 2 {
        return Err(BackendError::UnsupportedSize(size));
    }
    let mut entries = [0u16; RAMP_SIZE];
    let last = (size - 1) as f64;
    for (i, e) in entries.iter_mut().enumerate() {
        *e = sample(channel, i as f64 * last / (RAMP_SIZE - 1) as f64);
    }
    Ok(Ramp::from_entries(entries))
}

fn sample(table: &[u16], pos: f64) -> u16 {
    let lo = (pos.floor() as usize).min(table.len() - 1);
    let hi = (lo + 1).min(table.len() - 1);
    let t = pos - lo as f64;
    let v = f64::from(table[lo]) + t * (f64::from(table[hi]) - f64::from(table[lo]));
    v.round().clamp(0.0, 65535.0) as u16
}
