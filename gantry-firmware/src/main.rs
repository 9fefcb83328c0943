//! Gantry test stand firmware
//!
//! Drives two closed-loop axes (PWM step output, PWM-counter encoders,
//! home/far limit switches) and answers the host over UART0.
//!
//! Pin plan:
//!
//! | signal        | X       | Y       |
//! |---------------|---------|---------|
//! | step (PWM A)  | GPIO2   | GPIO6   |
//! | direction     | GPIO3   | GPIO7   |
//! | encoder (B)   | GPIO5   | GPIO9   |
//! | home switch   | GPIO10  | GPIO12  |
//! | far switch    | GPIO11  | GPIO13  |
//!
//! Thermistors on ADC0-3 (GPIO26-29), die sensor on ADC4.

#![no_std]
#![no_main]

extern crate alloc;

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::adc::{Adc, Channel, Config as AdcConfig};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::UART0;
use embassy_rp::pwm::{Config as PwmConfig, InputMode, Pwm};
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use embedded_alloc::LlffHeap as Heap;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use gantry_core::config::Calibration;
use gantry_core::motion::AxisEventQueue;
use gantry_core::{AxisRegistry, Controller};
use gantry_hal::{ByteDevice, MemoryStore};
use gantry_hal_rp2040::{AdcChannel, AxisInputs, FlashError, FlashStorage, PwmAxis, ThermistorBank, UartLink};
use gantry_protocol::{AxisId, Session};

use crate::channels::{AXIS_EVENTS, X_SHARED, Y_SHARED};

mod channels;
mod tasks;

/// Link settings and default calibration from gantry.toml
mod board {
    include!(concat!(env!("OUT_DIR"), "/board.rs"));
}

// Postcard pulls in alloc
#[global_allocator]
static HEAP: Heap = Heap::empty();

const HEAP_SIZE: usize = 4 * 1024;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

// UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 512]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 512]> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Gantry firmware starting...");

    init_heap();

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    // Calibration: flash image, else the gantry.toml defaults
    let mut storage = FlashStorage::new(p.FLASH, p.DMA_CH0);
    let calibration = load_calibration(&mut storage).await;
    let mut store = MemoryStore::<{ tasks::control::STORE_SLOTS }>::new();
    if let Err(e) = calibration.save(&mut store) {
        error!("Calibration does not fit the store: {}", e);
    }

    // Host link on UART0
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = board::LINK_BAUDRATE;
    let tx_buf = TX_BUF.init([0u8; 512]);
    let rx_buf = RX_BUF.init([0u8; 512]);
    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, uart_config)
        .into_buffered(Irqs, tx_buf, rx_buf);
    let mut link = UartLink::new(uart);
    if let Err(e) = link.open(board::LINK_BAUDRATE) {
        error!("Failed to open host link: {}", e);
    }
    info!("Host link at {} baud", board::LINK_BAUDRATE);

    // Inputs first: they publish the switch levels the drivers start from
    let x_inputs = AxisInputs::new(
        AxisId::X,
        Pwm::new_input(p.PWM_SLICE2, p.PIN_5, Pull::None, InputMode::RisingEdge, PwmConfig::default()),
        Input::new(p.PIN_10, Pull::Up),
        Input::new(p.PIN_11, Pull::Up),
        &X_SHARED,
    );
    let y_inputs = AxisInputs::new(
        AxisId::Y,
        Pwm::new_input(p.PWM_SLICE4, p.PIN_9, Pull::None, InputMode::RisingEdge, PwmConfig::default()),
        Input::new(p.PIN_12, Pull::Up),
        Input::new(p.PIN_13, Pull::Up),
        &Y_SHARED,
    );

    let x = PwmAxis::new(
        Pwm::new_output_a(p.PWM_SLICE1, p.PIN_2, PwmConfig::default()),
        Output::new(p.PIN_3, Level::Low),
        &X_SHARED,
    );
    let y = PwmAxis::new(
        Pwm::new_output_a(p.PWM_SLICE3, p.PIN_6, PwmConfig::default()),
        Output::new(p.PIN_7, Level::Low),
        &Y_SHARED,
    );
    let axes = AxisRegistry::new(x, y);
    for axis in axes.iter() {
        let state = axis.state();
        info!(
            "Axis {}: home={} far={}",
            axis.id(),
            state.home_pressed,
            state.far_pressed
        );
    }

    // Thermistors
    let adc = Adc::new_blocking(p.ADC, AdcConfig::default());
    let probe = ThermistorBank::new(
        adc,
        [
            Channel::new_pin(p.PIN_26, Pull::None),
            Channel::new_pin(p.PIN_27, Pull::None),
            Channel::new_pin(p.PIN_28, Pull::None),
            Channel::new_pin(p.PIN_29, Pull::None),
        ],
        Channel::new_temp_sensor(p.ADC_TEMP_SENSOR),
    );
    for (sensor, constants) in calibration.thermistors.iter().enumerate() {
        if let Some(channel) = AdcChannel::from_sensor(sensor as u8) {
            match channel.gpio() {
                Some(pin) => debug!("Sensor {} on GPIO{} enabled={}", sensor, pin, constants.enabled),
                None => debug!("Sensor {} on die enabled={}", sensor, constants.enabled),
            }
        }
    }

    let controller = Controller::new(Session::new(link), axes, probe, store);
    let (producer, consumer) = AXIS_EVENTS.init(AxisEventQueue::new()).split();

    spawner
        .spawn(tasks::sampler_task([x_inputs, y_inputs], producer))
        .unwrap();
    spawner
        .spawn(tasks::control_task(controller, consumer))
        .unwrap();
    spawner.spawn(tasks::calibration_task(storage)).unwrap();

    info!("All tasks spawned, firmware running");

    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}

/// Initialize the heap allocator
fn init_heap() {
    use core::mem::MaybeUninit;
    static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
    #[allow(static_mut_refs)]
    unsafe {
        HEAP.init(HEAP_MEM.as_ptr() as usize, HEAP_SIZE)
    }
}

/// Stored calibration, or the compiled-in defaults
async fn load_calibration(storage: &mut FlashStorage<'static>) -> Calibration {
    match storage.load_calibration().await {
        Ok(calibration) => {
            info!("Loaded calibration from flash");
            calibration
        }
        Err(FlashError::NotFound) => {
            info!("No calibration in flash, using gantry.toml defaults");
            board::DEFAULT_CALIBRATION
        }
        Err(e) => {
            warn!("Stored calibration rejected ({}), using gantry.toml defaults", e);
            board::DEFAULT_CALIBRATION
        }
    }
}
