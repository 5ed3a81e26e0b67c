use analog_joystick::calibration::ConsolePrompt;
use analog_joystick::controller::{JoystickController, JoystickInput, ReadMode};
use analog_joystick::hardware::{AnalogChannel, ButtonInput, GpioButton, SpiAdc};
use analog_joystick::JoystickSettings;
use color_eyre::{eyre::eyre, Result};
use std::fmt::Display;
use std::io::{self, Write};
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    println!("Joystick driver started...");
    let settings = JoystickSettings::load()?;

    let axis_one: u8 = ask("Input your first ADC channel: ")?;
    let axis_two: u8 = ask("Input your second ADC channel: ")?;
    let button_pin: u8 = ask("Input your button GPIO pin: ")?;

    let adc = SpiAdc::open(&settings.hardware)?;
    let mut prompt = ConsolePrompt;
    let mut joystick = JoystickController::initialize(
        &settings,
        adc.channel(axis_one)?,
        adc.channel(axis_two)?,
        GpioButton::new(button_pin)?,
        &mut prompt,
    )?;

    let mode: u8 = ask("Enter 1 to test and 0 to calibrate again: ")?;
    match mode {
        0 => {
            joystick.recalibrate(&mut prompt)?;
            println!(
                "Calibration written to {}",
                joystick.calibration_file().path().display()
            );
        }
        1 => monitor(&mut joystick, Duration::from_millis(settings.poll_interval_ms)).await,
        other => return Err(eyre!("Invalid mode choice: {}", other)),
    }

    Ok(())
}

/// Prints the query result every time it changes, until Ctrl+C.
async fn monitor<A: AnalogChannel, B: ButtonInput>(
    joystick: &mut JoystickController<A, B>,
    interval: Duration,
) {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => trigger.cancel(),
            Err(e) => warn!("Unable to listen for Ctrl+C: {}", e),
        }
    });

    info!("Monitoring joystick, press Ctrl+C to stop");
    let mut previous: Option<Option<JoystickInput>> = None;
    loop {
        let current = joystick.query(ReadMode::Threshold);
        if previous != Some(current) {
            match current {
                Some(input) => println!("{input}"),
                None => println!("none"),
            }
            previous = Some(current);
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    info!("Monitoring stopped");
}

fn ask<T>(question: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    print!("{question}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let answer = line.trim();
    answer
        .parse()
        .map_err(|e| eyre!("Invalid input '{}': {}", answer, e))
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .compact()
        .init();
}
