//! USB RGB lightbar CLI tool
//!
//! The lightbar is driven through HID SET_REPORT control transfers on interface 0,
//! using a reverse engineered command format.

use std::error::Error as StdError;
use std::num::ParseIntError;
use std::process;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use clap::{
    crate_description, crate_name, crate_version, value_parser, Arg, ArgAction, ArgMatches, Command,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::color::Rgb;
use crate::cpu::{CpuLoad, SysinfoCpuLoad};
use crate::error::Error;
use crate::frame::{LedEntry, ReportType};
use crate::session::{DeviceId, Session, SessionOptions, UsbHandle, UsbTransport};
use crate::usb::RusbTransport;

mod color;
mod cpu;
mod error;
mod frame;
mod session;
mod usb;

/// Time each brightness is held by the brightness test.
const BRIGHTNESS_TEST_HOLD: Duration = Duration::from_secs(2);

/// Lightbar action.
#[derive(PartialEq, Debug, Clone)]
enum Action {
    Brightness(u8),
    BrightnessTest,
    Color(Rgb),
    Off,
    Cpu,
    Random(Option<u64>),
}

impl Action {
    fn from_cli(matches: &ArgMatches) -> Result<Self, Box<dyn StdError>> {
        let action = match matches.subcommand() {
            Some(("brightness", matches)) => {
                Action::Brightness(*matches.get_one::<u8>("level").ok_or("missing brightness")?)
            },
            Some(("brightness-test", _)) => Action::BrightnessTest,
            Some(("color", matches)) => {
                let color = matches.get_one::<String>("color").ok_or("missing color")?;
                Action::Color(Rgb::from_str(color)?)
            },
            Some(("off", _)) => Action::Off,
            Some(("cpu", _)) => Action::Cpu,
            Some(("random", matches)) => Action::Random(matches.get_one::<u64>("seed").copied()),
            _ => return Err("missing subcommand".into()),
        };

        Ok(action)
    }
}

/// Lightbar config.
#[derive(Debug)]
struct Config {
    device: DeviceId,
    options: SessionOptions,
    action: Action,
}

impl Config {
    fn from_cli(matches: &ArgMatches) -> Result<Self, Box<dyn StdError>> {
        let mut config = Config { action: Action::from_cli(matches)?, ..Default::default() };

        if let Some(vendor_id) = matches.get_one::<String>("vendor-id") {
            config.device.vendor_id = parse_id(vendor_id)?;
        }

        if let Some(product_id) = matches.get_one::<String>("product-id") {
            config.device.product_id = parse_id(product_id)?;
        }

        config.options.commit = !matches.get_flag("no-commit");

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: Default::default(),
            options: Default::default(),
            action: Action::BrightnessTest,
        }
    }
}

fn main() {
    env_logger::init();

    let config = match Config::from_cli(&cli()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("\x1b[31mError:\x1b[0m {err}");
            process::exit(1);
        },
    };

    let transport = RusbTransport::new();
    match run(&transport, &config) {
        Ok(()) => println!("\x1b[32mSuccessfully applied changes.\x1b[0m"),
        Err(err) => {
            eprintln!("\x1b[31mError:\x1b[0m {err}");
            process::exit(1);
        },
    }
}

/// Apply the configured action to the lightbar.
fn run<T: UsbTransport>(transport: &T, config: &Config) -> Result<(), Error> {
    session::with_session(transport, config.device, config.options, |session| {
        match &config.action {
            Action::Brightness(level) => set_brightness(session, *level),
            Action::BrightnessTest => brightness_test(session, BRIGHTNESS_TEST_HOLD),
            Action::Color(color) => {
                println!("Setting all LEDs to {}", color);
                write_frame(session, &frame::fill(*color))
            },
            Action::Off => {
                println!("Turning all LEDs off");
                let entries: Vec<_> = (0..frame::LED_COUNT).map(LedEntry::off).collect();
                write_frame(session, &entries)
            },
            Action::Cpu => {
                let loads = SysinfoCpuLoad::new().per_cpu_utilization();
                println!("CPU utilization: {:.0?}", loads);
                write_frame(session, &cpu::cpu_frame(&loads))
            },
            Action::Random(Some(seed)) => random_colors(session, &mut StdRng::seed_from_u64(*seed)),
            Action::Random(None) => random_colors(session, &mut StdRng::from_entropy()),
        }
    })
}

/// Set the overall lightbar brightness.
fn set_brightness<H: UsbHandle>(session: &mut Session<H>, level: u8) -> Result<(), Error> {
    println!("Setting lightbar brightness to {}", level);
    write_buffer(session, &frame::encode_brightness(level), ReportType::Short)
}

/// Switch between minimum and maximum brightness.
fn brightness_test<H: UsbHandle>(session: &mut Session<H>, hold: Duration) -> Result<(), Error> {
    set_brightness(session, u8::MIN)?;
    thread::sleep(hold);
    set_brightness(session, u8::MAX)
}

/// Give every LED a random color.
fn random_colors<H, R>(session: &mut Session<H>, rng: &mut R) -> Result<(), Error>
where
    H: UsbHandle,
    R: Rng,
{
    let entries: Vec<_> =
        (0..frame::LED_COUNT).map(|index| LedEntry::new(index, color::random_color(rng))).collect();

    for entry in &entries {
        println!("Color for LED {}: {}", entry.index, entry.color);
    }

    write_frame(session, &entries)
}

fn write_frame<H: UsbHandle>(session: &mut Session<H>, entries: &[LedEntry]) -> Result<(), Error> {
    let frame = frame::encode_frame(entries)?;
    write_buffer(session, &frame, ReportType::Frame)
}

/// Write a buffer and echo it once the device accepted it.
fn write_buffer<H: UsbHandle>(
    session: &mut Session<H>,
    data: &[u8],
    report_type: ReportType,
) -> Result<(), Error> {
    session.write(data, report_type)?;
    println!("Successfully wrote data to usb: {:02x?}", data);
    Ok(())
}

/// Parse a USB ID in hexadecimal (`0x1038`) or decimal notation.
fn parse_id(id: &str) -> Result<u16, ParseIntError> {
    match id.strip_prefix("0x") {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => u16::from_str(id),
    }
}

/// Get clap CLI parameters.
fn cli() -> ArgMatches {
    cli_command().get_matches()
}

fn cli_command() -> Command {
    Command::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("vendor-id")
                .help("USB vendor ID [default: 0x1038]")
                .long("vendor-id")
                .global(true),
        )
        .arg(
            Arg::new("product-id")
                .help("USB product ID [default: 0x1134]")
                .long("product-id")
                .global(true),
        )
        .arg(
            Arg::new("no-commit")
                .help("Skip the commit command sent after every write")
                .long("no-commit")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("brightness").about("Set the lightbar brightness").arg(
                Arg::new("level")
                    .help("Brightness [possible values: 0..=255]")
                    .required(true)
                    .value_parser(value_parser!(u8)),
            ),
        )
        .subcommand(
            Command::new("brightness-test").about("Switch from minimum to maximum brightness"),
        )
        .subcommand(
            Command::new("color")
                .about("Set all LEDs to one color")
                .arg(Arg::new("color").help("LED color in RGB [0xRRGGBB]").required(true)),
        )
        .subcommand(Command::new("off").about("Turn all LEDs off"))
        .subcommand(Command::new("cpu").about("Color LEDs by per-CPU utilization"))
        .subcommand(
            Command::new("random").about("Set all LEDs to random colors").arg(
                Arg::new("seed")
                    .help("Seed for reproducible colors")
                    .long("seed")
                    .value_parser(value_parser!(u64)),
            ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::mock::{options, MockTransport};

    fn config(action: Action, commit: bool) -> Config {
        Config { action, options: options(commit), ..Default::default() }
    }

    fn parse(args: &[&str]) -> Config {
        let matches = cli_command().try_get_matches_from(args).unwrap();
        Config::from_cli(&matches).unwrap()
    }

    #[test]
    fn brightness_min_then_max() {
        let transport = MockTransport::new();
        let session = &mut Session::open(&transport, DeviceId::default(), options(false)).unwrap();

        brightness_test(session, Duration::from_millis(0)).unwrap();

        let transfers = transport.transfers();
        assert_eq!(transfers.len(), 2);
        assert_eq!(transfers[0].data, frame::encode_brightness(0).to_vec());
        assert_eq!(transfers[1].data, frame::encode_brightness(255).to_vec());
        assert!(transfers
            .iter()
            .all(|transfer| transfer.data.len() == 3 && transfer.value == 0x0200));
    }

    #[test]
    fn failed_write_stops_sequence() {
        let transport = MockTransport { fail_after: Some(1), ..MockTransport::new() };
        let session = &mut Session::open(&transport, DeviceId::default(), options(false)).unwrap();

        assert!(brightness_test(session, Duration::from_millis(0)).is_err());
        assert_eq!(transport.transfers().len(), 1);
    }

    #[test]
    fn brightness_commits_each_write() {
        let transport = MockTransport::new();
        let session = &mut Session::open(&transport, DeviceId::default(), options(true)).unwrap();

        brightness_test(session, Duration::from_millis(0)).unwrap();

        let data: Vec<_> =
            transport.transfers().into_iter().map(|transfer| transfer.data).collect();
        let commit = frame::encode_commit().to_vec();
        let expected = vec![vec![0x0c, 0x00, 0x00], commit.clone(), vec![0x0c, 0x00, 0xff], commit];
        assert_eq!(data, expected);
    }

    #[test]
    fn color_writes_full_frame() {
        let transport = MockTransport::new();
        let color = Rgb::new(0x10, 0x20, 0x30);

        run(&transport, &config(Action::Color(color), false)).unwrap();

        let transfers = transport.transfers();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].value, 0x0300);
        assert_eq!(transfers[0].data.len(), 4 + 12 * frame::LED_COUNT as usize);
        assert_eq!(&transfers[0].data[4..7], &[0x10, 0x20, 0x30]);
        assert_eq!(transport.log.borrow().closed, 1);
    }

    #[test]
    fn off_disables_leds() {
        let transport = MockTransport::new();

        run(&transport, &config(Action::Off, false)).unwrap();

        let data = &transport.transfers()[0].data;
        assert!(data[4..].chunks(12).all(|group| group[8] == 0x00));
    }

    #[test]
    fn seeded_random_frames_repeat() {
        let first = MockTransport::new();
        let second = MockTransport::new();

        run(&first, &config(Action::Random(Some(42)), false)).unwrap();
        run(&second, &config(Action::Random(Some(42)), false)).unwrap();

        assert_eq!(first.transfers(), second.transfers());
    }

    #[test]
    fn missing_device_writes_nothing() {
        let transport = MockTransport::new();
        let mut config = config(Action::Brightness(10), true);
        config.device = DeviceId::new(0xdead, 0xbeef);

        assert!(matches!(run(&transport, &config), Err(Error::DeviceNotFound(_))));
        assert!(transport.transfers().is_empty());
    }

    #[test]
    fn cli_defaults() {
        let config = parse(&["lightbar", "brightness", "128"]);

        assert_eq!(config.action, Action::Brightness(128));
        assert_eq!(config.device, DeviceId::default());
        assert!(config.options.commit);
    }

    #[test]
    fn cli_overrides() {
        let config = parse(&[
            "lightbar",
            "--vendor-id",
            "0x046d",
            "random",
            "--seed",
            "3",
            "--product-id",
            "42",
            "--no-commit",
        ]);

        assert_eq!(config.action, Action::Random(Some(3)));
        assert_eq!(config.device, DeviceId::new(0x046d, 42));
        assert!(!config.options.commit);
    }

    #[test]
    fn cli_color() {
        let config = parse(&["lightbar", "color", "0xff0000"]);
        assert_eq!(config.action, Action::Color(Rgb::new(0xff, 0, 0)));

        let matches = cli_command().try_get_matches_from(&["lightbar", "color", "red"]).unwrap();
        assert!(Config::from_cli(&matches).is_err());
    }

    #[test]
    fn cli_rejects_out_of_range_brightness() {
        assert!(cli_command().try_get_matches_from(&["lightbar", "brightness", "256"]).is_err());
    }

    #[test]
    fn usb_ids() {
        assert_eq!(parse_id("0x1038"), Ok(0x1038));
        assert_eq!(parse_id("4152"), Ok(4152));
        assert!(parse_id("0xfffff").is_err());
    }
}
