//! Panel driver abstraction and the generic SPI e-paper driver.
//!
//! [`PanelDriver`] is the seam between the display adapter and real
//! hardware: wake, transmit, refresh, sleep. The relay ships one generic
//! implementation, [`SpiPanelDriver`], written against the `embedded-hal`
//! 1.0 traits so any platform HAL (rppal, linux-embedded-hal, ...) can
//! supply the concrete SPI bus and GPIO pins. Per-model differences live in
//! a static [`DriverProfile`] command table rather than per-model types.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;
use tracing::{debug, info, trace};

use crate::frame::IndexedFrame;
use crate::{RelayError, Result};

/// Model-specific driver operations, serialized by the display adapter.
///
/// Implementations report failures as errors; they must never panic. The
/// adapter leaves a failed driver in its last-known state and keeps serving.
pub trait PanelDriver: Send {
    /// Command profile identifier, e.g. `"epd5in79g"`.
    fn driver_id(&self) -> &'static str;

    /// Wake and configure the controller. Called once at startup.
    fn init(&mut self) -> Result<()>;

    /// Transmit a quantized frame and trigger a full refresh.
    fn display_frame(&mut self, frame: &IndexedFrame) -> Result<()>;

    /// Refresh the panel to its background color.
    fn clear(&mut self) -> Result<()>;

    /// Enter deep sleep to protect the panel from DC stress.
    fn sleep(&mut self) -> Result<()>;
}

/// Static command profile for one controller family.
#[derive(Debug, Clone, Copy)]
pub struct DriverProfile {
    pub driver_id: &'static str,
    pub width: u32,
    pub height: u32,
    /// 2 packs four pixels per byte, 4 packs two.
    pub bits_per_pixel: u8,
    /// Palette index to controller color code.
    pub color_codes: &'static [u8],
    /// Controller code written by `clear`.
    pub background_code: u8,
    /// Configuration writes issued after reset, in order.
    pub init_sequence: &'static [(u8, &'static [u8])],
    /// Frame data transmission command.
    pub frame_command: u8,
    pub power_on_command: u8,
    pub refresh_command: u8,
    pub refresh_data: &'static [u8],
    pub power_off_command: u8,
    pub sleep_command: (u8, &'static [u8]),
    /// Busy line level while the controller is working.
    pub busy_when_low: bool,
    /// Upper bound on one refresh cycle; color panels take tens of seconds.
    pub refresh_timeout_ms: u32,
}

// Command numbering follows the UC8179-family convention shared by the
// supported Waveshare panels: PSR 0x00, PWR 0x01, POF 0x02, PON 0x04,
// BTST 0x06, DSLP 0x07, DTM 0x10, DRF 0x12, CDI 0x50, TRES 0x61.

static PROFILE_5IN79G: DriverProfile = DriverProfile {
    driver_id: "epd5in79g",
    width: 792,
    height: 272,
    bits_per_pixel: 2,
    color_codes: &[0b00, 0b01, 0b10, 0b11],
    background_code: 0b01,
    init_sequence: &[
        (0x00, &[0x2F, 0x29]),
        (0x01, &[0x07, 0x00]),
        (0x06, &[0x0F, 0x8B, 0x93, 0xA1]),
        (0x50, &[0x37]),
        (0x61, &[0x03, 0x18, 0x01, 0x10]),
    ],
    frame_command: 0x10,
    power_on_command: 0x04,
    refresh_command: 0x12,
    refresh_data: &[0x00],
    power_off_command: 0x02,
    sleep_command: (0x07, &[0xA5]),
    busy_when_low: true,
    refresh_timeout_ms: 35_000,
};

static PROFILE_7IN3E: DriverProfile = DriverProfile {
    driver_id: "epd7in3e",
    width: 800,
    height: 480,
    bits_per_pixel: 4,
    color_codes: &[0x0, 0x1, 0x2, 0x3, 0x5, 0x6],
    background_code: 0x1,
    init_sequence: &[
        (0x00, &[0xEF, 0x08]),
        (0x01, &[0x37, 0x00, 0x23, 0x23]),
        (0x06, &[0xC7, 0xC7, 0x1D]),
        (0x50, &[0x37]),
        (0x61, &[0x03, 0x20, 0x01, 0xE0]),
    ],
    frame_command: 0x10,
    power_on_command: 0x04,
    refresh_command: 0x12,
    refresh_data: &[0x00],
    power_off_command: 0x02,
    sleep_command: (0x07, &[0xA5]),
    busy_when_low: true,
    refresh_timeout_ms: 45_000,
};

static PROFILE_4IN01F: DriverProfile = DriverProfile {
    driver_id: "epd4in01f",
    width: 640,
    height: 400,
    bits_per_pixel: 4,
    color_codes: &[0x0, 0x1, 0x2, 0x3, 0x4, 0x5, 0x6],
    background_code: 0x1,
    init_sequence: &[
        (0x00, &[0x2F, 0x00]),
        (0x01, &[0x37, 0x00, 0x05, 0x05]),
        (0x06, &[0xC7, 0xC7, 0x1D]),
        (0x50, &[0x37]),
        (0x61, &[0x02, 0x80, 0x01, 0x90]),
    ],
    frame_command: 0x10,
    power_on_command: 0x04,
    refresh_command: 0x12,
    refresh_data: &[],
    power_off_command: 0x02,
    sleep_command: (0x07, &[0xA5]),
    busy_when_low: true,
    refresh_timeout_ms: 35_000,
};

static PROFILES: &[&DriverProfile] = &[&PROFILE_5IN79G, &PROFILE_7IN3E, &PROFILE_4IN01F];

/// Look up the command profile for a registry driver identifier.
pub fn profile_for(driver_id: &str) -> Option<&'static DriverProfile> {
    PROFILES.iter().find(|profile| profile.driver_id == driver_id).copied()
}

/// Pack palette indices into the controller's wire format.
///
/// 2 bpp packs four pixels per byte, 4 bpp two pixels per byte, both MSB
/// first. A trailing partial byte is padded with the background code.
pub fn pack_pixels(profile: &DriverProfile, indices: &[u8]) -> Vec<u8> {
    let code = |index: u8| -> u8 {
        profile
            .color_codes
            .get(index as usize)
            .copied()
            .unwrap_or(profile.background_code)
    };

    match profile.bits_per_pixel {
        2 => indices
            .chunks(4)
            .map(|chunk| {
                let mut byte = 0u8;
                for slot in 0..4 {
                    let value =
                        chunk.get(slot).map(|&i| code(i)).unwrap_or(profile.background_code);
                    byte |= (value & 0b11) << (6 - slot * 2);
                }
                byte
            })
            .collect(),
        _ => indices
            .chunks(2)
            .map(|chunk| {
                let high = code(chunk[0]) & 0x0F;
                let low = chunk
                    .get(1)
                    .map(|&i| code(i))
                    .unwrap_or(profile.background_code)
                    & 0x0F;
                (high << 4) | low
            })
            .collect(),
    }
}

/// Generic SPI e-paper driver parameterized by a command profile.
///
/// `DC` selects command vs data, `RST` pulses the hardware reset, `BUSY`
/// reads the controller's busy line, `DELAY` provides pacing.
pub struct SpiPanelDriver<SPI, DC, RST, BUSY, DELAY> {
    spi: SPI,
    dc: DC,
    rst: RST,
    busy: BUSY,
    delay: DELAY,
    profile: &'static DriverProfile,
}

impl<SPI, DC, RST, BUSY, DELAY> SpiPanelDriver<SPI, DC, RST, BUSY, DELAY>
where
    SPI: SpiDevice + Send,
    DC: OutputPin + Send,
    RST: OutputPin + Send,
    BUSY: InputPin + Send,
    DELAY: DelayNs + Send,
{
    /// Create a driver for the given profile. `init` must run before the
    /// first frame.
    pub fn new(
        profile: &'static DriverProfile,
        spi: SPI,
        dc: DC,
        rst: RST,
        busy: BUSY,
        delay: DELAY,
    ) -> Self {
        Self { spi, dc, rst, busy, delay, profile }
    }

    fn io_error(&self, context: &str, details: impl std::fmt::Debug) -> RelayError {
        RelayError::hardware_write(self.profile.driver_id, format!("{context}: {details:?}"))
    }

    fn hard_reset(&mut self) -> Result<()> {
        self.rst.set_high().map_err(|e| self.io_error("reset high", e))?;
        self.delay.delay_ms(20);
        self.rst.set_low().map_err(|e| self.io_error("reset low", e))?;
        self.delay.delay_ms(2);
        self.rst.set_high().map_err(|e| self.io_error("reset release", e))?;
        self.delay.delay_ms(20);
        Ok(())
    }

    fn send_command(&mut self, command: u8) -> Result<()> {
        self.dc.set_low().map_err(|e| self.io_error("dc low", e))?;
        self.spi
            .write(&[command])
            .map_err(|e| self.io_error("command write", e))
    }

    fn send_data(&mut self, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.dc.set_high().map_err(|e| self.io_error("dc high", e))?;
        // Chunked so HALs with bounded transfer sizes stay within limits.
        for chunk in data.chunks(4096) {
            self.spi.write(chunk).map_err(|e| self.io_error("data write", e))?;
        }
        Ok(())
    }

    fn wait_until_idle(&mut self, timeout_ms: u32) -> Result<()> {
        const POLL_MS: u32 = 10;
        let mut waited = 0u32;
        loop {
            let level = self.busy.is_high().map_err(|e| self.io_error("busy read", e))?;
            let busy = if self.profile.busy_when_low { !level } else { level };
            if !busy {
                return Ok(());
            }
            if waited >= timeout_ms {
                return Err(RelayError::hardware_write(
                    self.profile.driver_id,
                    format!("busy line stuck for {timeout_ms}ms"),
                ));
            }
            self.delay.delay_ms(POLL_MS);
            waited += POLL_MS;
        }
    }

    fn transmit_and_refresh(&mut self, packed: &[u8]) -> Result<()> {
        self.send_command(self.profile.frame_command)?;
        self.send_data(packed)?;

        self.send_command(self.profile.power_on_command)?;
        self.wait_until_idle(5_000)?;

        trace!(driver = self.profile.driver_id, "Triggering panel refresh");
        self.send_command(self.profile.refresh_command)?;
        self.send_data(self.profile.refresh_data)?;
        self.wait_until_idle(self.profile.refresh_timeout_ms)?;

        self.send_command(self.profile.power_off_command)?;
        self.wait_until_idle(5_000)
    }
}

impl<SPI, DC, RST, BUSY, DELAY> PanelDriver for SpiPanelDriver<SPI, DC, RST, BUSY, DELAY>
where
    SPI: SpiDevice + Send,
    DC: OutputPin + Send,
    RST: OutputPin + Send,
    BUSY: InputPin + Send,
    DELAY: DelayNs + Send,
{
    fn driver_id(&self) -> &'static str {
        self.profile.driver_id
    }

    fn init(&mut self) -> Result<()> {
        info!(driver = self.profile.driver_id, "Initializing panel controller");
        self.hard_reset()?;
        self.wait_until_idle(5_000)?;
        let sequence = self.profile.init_sequence;
        for &(command, data) in sequence {
            self.send_command(command)?;
            self.send_data(data)?;
        }
        self.wait_until_idle(5_000)
    }

    fn display_frame(&mut self, frame: &IndexedFrame) -> Result<()> {
        if frame.width() != self.profile.width || frame.height() != self.profile.height {
            return Err(RelayError::hardware_write(
                self.profile.driver_id,
                format!(
                    "frame is {}x{}, controller expects {}x{}",
                    frame.width(),
                    frame.height(),
                    self.profile.width,
                    self.profile.height
                ),
            ));
        }

        let packed = pack_pixels(self.profile, frame.indices());
        debug!(
            driver = self.profile.driver_id,
            bytes = packed.len(),
            "Transmitting frame buffer"
        );
        self.transmit_and_refresh(&packed)
    }

    fn clear(&mut self) -> Result<()> {
        let pixels = self.profile.width as usize * self.profile.height as usize;
        let per_byte = (8 / self.profile.bits_per_pixel) as usize;
        let mut byte = 0u8;
        for slot in 0..per_byte {
            byte |= self.profile.background_code
                << (8 - self.profile.bits_per_pixel as usize * (slot + 1));
        }
        let packed = vec![byte; pixels.div_ceil(per_byte)];
        self.transmit_and_refresh(&packed)
    }

    fn sleep(&mut self) -> Result<()> {
        info!(driver = self.profile.driver_id, "Putting panel into deep sleep");
        let (command, data) = self.profile.sleep_command;
        self.send_command(command)?;
        self.send_data(data)
    }
}
