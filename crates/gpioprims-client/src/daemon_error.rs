//! Daemon error codes and their descriptions.

use std::fmt;

/// A negative result reported by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonError {
    /// The negative error code.
    pub code: i32,
}

impl DaemonError {
    /// Wrap a daemon error code.
    pub fn new(code: i32) -> Self {
        Self { code }
    }

    /// Human-readable description from the static error table.
    pub fn description(&self) -> String {
        error_text(self.code)
    }
}

impl fmt::Display for DaemonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match lookup(self.code) {
            Some(text) => write!(f, "{text} ({})", self.code),
            None => write!(f, "unknown error ({})", self.code),
        }
    }
}

impl std::error::Error for DaemonError {}

/// Returns a text description of a daemon error code.
///
/// Codes missing from the table map to `"unknown error (<code>)"`.
pub fn error_text(code: i32) -> String {
    match lookup(code) {
        Some(text) => text.to_string(),
        None => format!("unknown error ({code})"),
    }
}

fn lookup(code: i32) -> Option<&'static str> {
    ERRORS
        .iter()
        .find(|(candidate, _)| *candidate == code)
        .map(|(_, text)| *text)
}

const ERRORS: &[(i32, &str)] = &[
    (-1, "pigpio initialisation failed"),
    (-2, "gpio not 0-31"),
    (-3, "gpio not 0-53"),
    (-4, "mode not 0-7"),
    (-5, "level not 0-1"),
    (-6, "pud not 0-2"),
    (-7, "pulsewidth not 0 or 500-2500"),
    (-8, "dutycycle not 0-range (default 255)"),
    (-9, "timer not 0-9"),
    (-10, "ms not 10-60000"),
    (-11, "timetype not 0-1"),
    (-12, "seconds < 0"),
    (-13, "micros not 0-999999"),
    (-14, "gpioSetTimerFunc failed"),
    (-15, "timeout not 0-60000"),
    (-16, "DEPRECATED"),
    (-17, "clock peripheral not 0-1"),
    (-18, "DEPRECATED"),
    (-19, "clock micros not 1, 2, 4, 5, 8, or 10"),
    (-20, "buf millis not 100-10000"),
    (-21, "dutycycle range not 25-40000"),
    (-22, "signum not 0-63"),
    (-23, "can't open pathname"),
    (-24, "no handle available"),
    (-25, "unknown handle"),
    (-26, "ifFlags > 3"),
    (-27, "DMA channel not 0-14"),
    (-28, "socket port not 1024-30000"),
    (-29, "unknown fifo command"),
    (-30, "DMA secondary channel not 0-6"),
    (-31, "function called before gpioInitialise"),
    (-32, "function called after gpioInitialise"),
    (-33, "waveform mode not 0-1"),
    (-34, "bad parameter in gpioCfgInternals call"),
    (-35, "baud rate not 50-250000(RX)/1000000(TX)"),
    (-36, "waveform has too many pulses"),
    (-37, "waveform has too many chars"),
    (-38, "no bit bang serial read in progress on gpio"),
    (-41, "no permission to update gpio"),
    (-42, "no permission to update one or more gpios"),
    (-43, "bad WVSC subcommand"),
    (-44, "bad WVSM subcommand"),
    (-45, "bad WVSP subcommand"),
    (-46, "trigger pulse length not 1-100"),
    (-47, "invalid script"),
    (-48, "unknown script id"),
    (-49, "add serial data offset > 30 minute"),
    (-50, "gpio already in use"),
    (-51, "must read at least a byte at a time"),
    (-52, "script parameter id not 0-9"),
    (-53, "script has duplicate tag"),
    (-54, "script has too many tags"),
    (-55, "illegal script command"),
    (-56, "script variable id not 0-149"),
    (-57, "no more room for scripts"),
    (-58, "can't allocate temporary memory"),
    (-59, "socket read failed"),
    (-60, "socket write failed"),
    (-61, "too many script parameters (> 10)"),
    (-62, "script already running or failed"),
    (-63, "script has unresolved tag"),
    (-64, "bad MICS delay (too large)"),
    (-65, "bad MILS delay (too large)"),
    (-66, "non existent wave id"),
    (-67, "No more CBs for waveform"),
    (-68, "No more OOL for waveform"),
    (-69, "attempt to create an empty waveform"),
    (-70, "No more waveform ids"),
    (-71, "can't open I2C device"),
    (-72, "can't open serial device"),
    (-73, "can't open SPI device"),
    (-74, "bad I2C bus"),
    (-75, "bad I2C address"),
    (-76, "bad SPI channel"),
    (-77, "bad i2c/spi/ser open flags"),
    (-78, "bad SPI speed"),
    (-79, "bad serial device name"),
    (-80, "bad serial baud rate"),
    (-81, "bad i2c/spi/ser parameter"),
    (-82, "I2C write failed"),
    (-83, "I2C read failed"),
    (-84, "bad SPI count"),
    (-85, "ser write failed"),
    (-86, "ser read failed"),
    (-87, "ser read no data available"),
    (-88, "unknown command"),
    (-89, "SPI xfer/read/write failed"),
    (-90, "bad (NULL) pointer"),
    (-91, "need a A+/B+/Pi2 for auxiliary SPI"),
    (-92, "gpio is not in use for PWM"),
    (-93, "gpio is not in use for servo pulses"),
    (-94, "gpio has no hardware clock"),
    (-95, "gpio has no hardware PWM"),
    (-96, "hardware PWM frequency not 1-125M"),
    (-97, "hardware PWM dutycycle not 0-1M"),
    (-98, "hardware clock frequency not 4689-250M"),
    (-99, "need password to use hardware clock 1"),
    (-100, "illegal, PWM in use for main clock"),
    (-101, "serial data bits not 1-32"),
    (-102, "serial (half) stop bits not 2-8"),
    (-103, "socket/pipe message too big"),
];
