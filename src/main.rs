#![no_main]
#![no_std]
// Firmware binary wiring `cablecam_ctrl::Controller` to real hardware on an
// STM32 MCU: input-capture timers for the RC channels and the quadrature
// encoder, a compare channel for the ESC PWM, a USART for diagnostics, and a
// GPIO pin for the warning LED. The core itself (everything under `src/`
// besides this file) has no hardware dependency and is unit-tested on host.

use cablecam_ctrl::{
    consts::TA,
    diagnostics::DiagnosticEvent,
    hw::{ChannelSource, Clock, EncoderSource, LedSink, PwmSink},
    settings::Settings,
    status::Monitor,
    Controller,
};
use cfg_if::cfg_if;
use defmt::println;
use defmt_rtt as _;
use panic_probe as _;

use stm32_hal2::{
    clocks::{Clocks, InputSrc, PllSrc},
    gpio::{OutputType, Pin, PinMode, Port},
    pac,
    timer::{OutputCompare, Timer, TimerConfig, TimerInterrupt},
    usart::{Usart, UsartConfig},
};

cfg_if! {
    if #[cfg(feature = "h7")] {
        use stm32_hal2::clocks::PllCfg;
    } else if #[cfg(feature = "g4")] {
        // G4 uses the default PLL setup below; nothing additional required.
    }
}

/// RC channel indices, matching the connector ordering on the control board.
/// `settings.rc_channel_*` fields index into this array at runtime, so the
/// board wiring can change without touching the core.
const NUM_RC_CHANNELS: usize = 5;

/// Latest captured pulse width per RC channel, in microseconds. Written by
/// the per-channel input-capture ISRs, read once per `control_tick`. A torn
/// read of one element is tolerable (`spec.md` §5): the next 50 Hz tick
/// converges.
struct RcChannels {
    duty: [u16; NUM_RC_CHANNELS],
}

impl ChannelSource for RcChannels {
    fn duty(&self, channel: u8) -> u16 {
        self.duty
            .get(channel as usize)
            .copied()
            .unwrap_or(0)
    }
}

/// Quadrature-encoder position, read from the encoder timer's counter
/// register each tick.
struct Encoder<'a> {
    timer: &'a Timer<pac::TIM4>,
}

impl EncoderSource for Encoder<'_> {
    fn position(&self) -> i32 {
        self.timer.read_count() as i32
    }
}

/// The 1 Hz diagnostics flag and a free-running millisecond clock, both
/// driven off hardware timers independent of the 50 Hz control timer.
struct Clocks50Hz {
    ms: u32,
    is_1hz: bool,
}

impl Clock for Clocks50Hz {
    fn is_1hz(&self) -> bool {
        self.is_1hz
    }

    fn monotonic_ms(&self) -> u32 {
        self.ms
    }
}

struct EscPwm<'a> {
    timer: &'a mut Timer<pac::TIM2>,
    channel: stm32_hal2::timer::TimChannel,
}

impl PwmSink for EscPwm<'_> {
    fn write(&mut self, pulse_width_us: u16) {
        // The ESC timer runs at 1 MHz (1 us/tick, `spec.md` §6's PWM
        // compatibility note), so the pulse width in microseconds is the
        // compare value directly.
        self.timer.set_duty(self.channel, u32::from(pulse_width_us));
    }
}

struct WarningLed {
    pin: Pin,
}

impl LedSink for WarningLed {
    fn set_warning(&mut self, on: bool) {
        if on {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }
}

/// Diagnostic sink: formats `DiagnosticEvent`s via `defmt` over RTT, and (if
/// wired) a USART. Coalesces identical back-to-back events so the 50 Hz task
/// never blocks on serial I/O even if every tick reports the same condition
/// (`SPEC_FULL.md` §4's `[ADDED]` diagnostic-events note).
struct DiagnosticsSink {
    uart: Usart<pac::USART2>,
    last: Option<DiagnosticEvent>,
}

impl DiagnosticsSink {
    fn emit(&mut self, event: DiagnosticEvent, is_1hz: bool) {
        if !is_1hz && self.last == Some(event) {
            return;
        }
        self.last = Some(event);
        println!("cablecam: {:?}", event);
        // Best-effort: a backpressured UART drops the diagnostic rather than
        // blocking the 50 Hz task (`spec.md` §5).
        let _ = self.uart.write(b"cablecam-diag\r\n");
    }
}

#[rtic::app(device = pac, peripherals = false, dispatchers = [EXTI9_5])]
mod app {
    use super::*;

    #[shared]
    struct Shared {
        settings: Settings,
        rc: RcChannels,
        monitor: Monitor,
        /// Set by `slow_tick`, consumed and cleared by the next
        /// `control_tick` -- the only handoff between the 1 Hz and 50 Hz
        /// tasks (`spec.md` §5/§6 `is_1hz`).
        is_1hz: bool,
    }

    #[local]
    struct Local {
        controller: Controller,
        control_timer: Timer<pac::TIM15>,
        slow_timer: Timer<pac::TIM16>,
        encoder_timer: Timer<pac::TIM4>,
        esc_timer: Timer<pac::TIM2>,
        warning_led: WarningLed,
        diagnostics: DiagnosticsSink,
        ms_counter: u32,
        /// Set for the duration of `control_tick`'s body; RTIC's priority
        /// ceiling already makes re-entrancy impossible, so this only ever
        /// backs a `debug_assert!` that would catch a misconfigured
        /// priority before it could corrupt carry state (`SPEC_FULL.md`
        /// §5's overrun instrumentation).
        in_tick: bool,
        // TIM3 exposes 4 capture/compare channels, covering the speed stick,
        // programming switch, endpoint switch, and max-accel pot. The
        // max-speed pot (channel 4) is captured on TIM1's spare channel since
        // one 4-channel timer can't carry all five RC inputs.
        rc_timer: Timer<pac::TIM3>,
        rc_timer_5th: Timer<pac::TIM1>,
    }

    #[init]
    fn init(cx: init::Context) -> (Shared, Local) {
        let mut cp = cx.core;
        let dp = pac::Peripherals::take().unwrap();

        cp.SCB.enable_icache();

        cfg_if! {
            if #[cfg(feature = "h7")] {
                let clock_cfg = Clocks {
                    pll_src: PllSrc::Hse(16_000_000),
                    pll1: PllCfg {
                        divm: 8,
                        ..Default::default()
                    },
                    ..Clocks::full_speed()
                };
            } else {
                let clock_cfg = Clocks {
                    input_src: InputSrc::Pll(PllSrc::Hse(16_000_000)),
                    ..Default::default()
                };
            }
        }
        clock_cfg.setup().unwrap();

        // 50 Hz control tick -- the only hard-real-time task in the system.
        let mut control_timer = Timer::new_tim15(dp.TIM15, 1. / TA, Default::default(), &clock_cfg);
        control_timer.enable_interrupt(TimerInterrupt::Update);

        // 1 Hz diagnostics tick; only ever sets the `is_1hz` flag and flushes
        // buffered diagnostics, never competes with `control_tick` for the
        // 20 ms budget (`spec.md` §5).
        let mut slow_timer = Timer::new_tim16(dp.TIM16, 1., Default::default(), &clock_cfg);
        slow_timer.enable_interrupt(TimerInterrupt::Update);

        // Quadrature-encoder input, free-running counter; `spec.md` §6's
        // `encoder_value()` maps directly onto this timer's count register.
        let _enc_a = Pin::new(Port::B, 6, PinMode::Alt(2));
        let _enc_b = Pin::new(Port::B, 7, PinMode::Alt(2));
        let encoder_timer = Timer::new_tim4(
            dp.TIM4,
            1.,
            TimerConfig {
                auto_reload_preload: true,
                ..Default::default()
            },
            &clock_cfg,
        );

        // RC input-capture channels: speed stick, programming switch,
        // endpoint switch, max-accel pot, max-speed pot -- five channels on
        // one 16-bit capture/compare timer.
        let _rc_ch0 = Pin::new(Port::A, 0, PinMode::Alt(1));
        let _rc_ch1 = Pin::new(Port::A, 1, PinMode::Alt(1));
        let _rc_ch2 = Pin::new(Port::A, 2, PinMode::Alt(1));
        let _rc_ch3 = Pin::new(Port::A, 3, PinMode::Alt(1));
        let _rc_ch4 = Pin::new(Port::B, 0, PinMode::Alt(1));

        // ESC PWM output, running at 1 MHz so the compare register holds the
        // pulse width in microseconds directly (`spec.md` §6).
        let mut esc_pin = Pin::new(Port::A, 5, PinMode::Alt(1));
        esc_pin.output_type(OutputType::PushPull);
        let mut esc_timer = Timer::new_tim2(
            dp.TIM2,
            50.,
            TimerConfig {
                auto_reload_preload: true,
                ..Default::default()
            },
            &clock_cfg,
        );
        esc_timer.enable_pwm_output(
            stm32_hal2::timer::TimChannel::C1,
            OutputCompare::Pwm1,
            0.,
        );

        let mut warning_pin = Pin::new(Port::C, 13, PinMode::Output);
        warning_pin.set_low();

        let uart = Usart::new(
            dp.USART2,
            115_200,
            UsartConfig::default(),
            &clock_cfg,
        );

        let rc_timer = Timer::new_tim3(dp.TIM3, 1_000_000., Default::default(), &clock_cfg);
        let rc_timer_5th = Timer::new_tim1(dp.TIM1, 1_000_000., Default::default(), &clock_cfg);

        let settings = Settings::default();

        (
            Shared {
                settings,
                rc: RcChannels {
                    duty: [0; NUM_RC_CHANNELS],
                },
                monitor: Monitor::Free,
                is_1hz: false,
            },
            Local {
                controller: Controller::new(),
                control_timer,
                slow_timer,
                encoder_timer,
                esc_timer,
                warning_led: WarningLed { pin: warning_pin },
                diagnostics: DiagnosticsSink { uart, last: None },
                ms_counter: 0,
                in_tick: false,
                rc_timer,
                rc_timer_5th,
            },
        )
    }

    /// Bound to the RC capture timer's four channels. Each fires on a
    /// completed pulse-width capture; the decoded width is written straight
    /// into the shared `rc` resource for `control_tick` to read next cycle.
    /// A torn read of one channel's `u16` is the one tolerated race `spec.md`
    /// §5 calls out -- the next 50 Hz tick converges.
    #[task(binds = TIM3, shared = [rc], local = [rc_timer], priority = 6)]
    fn rc_capture_isr(mut cx: rc_capture_isr::Context) {
        use stm32_hal2::timer::TimChannel;
        cx.local.rc_timer.clear_interrupt(TimerInterrupt::Cc1);
        cx.local.rc_timer.clear_interrupt(TimerInterrupt::Cc2);
        cx.local.rc_timer.clear_interrupt(TimerInterrupt::Cc3);
        cx.local.rc_timer.clear_interrupt(TimerInterrupt::Cc4);

        let widths = [
            cx.local.rc_timer.get_capture(TimChannel::C1),
            cx.local.rc_timer.get_capture(TimChannel::C2),
            cx.local.rc_timer.get_capture(TimChannel::C3),
            cx.local.rc_timer.get_capture(TimChannel::C4),
        ];
        cx.shared.rc.lock(|rc| {
            for (i, w) in widths.into_iter().enumerate() {
                rc.duty[i] = w;
            }
        });
    }

    /// Bound to the fifth RC channel's dedicated capture timer (the max-speed
    /// pot); see the `Local::rc_timer_5th` field comment for why it isn't on
    /// `TIM3` with the other four.
    #[task(binds = TIM1_CC, shared = [rc], local = [rc_timer_5th], priority = 6)]
    fn rc_capture_5th_isr(mut cx: rc_capture_5th_isr::Context) {
        use stm32_hal2::timer::TimChannel;
        cx.local.rc_timer_5th.clear_interrupt(TimerInterrupt::Cc1);
        let width = cx.local.rc_timer_5th.get_capture(TimChannel::C1);
        cx.shared.rc.lock(|rc| rc.duty[4] = width);
    }

    /// Bound to the 50 Hz hardware timer. Runs exactly one control cycle: the
    /// entire body is non-blocking, so this always completes well inside the
    /// 20 ms budget (`spec.md` §5).
    #[task(
        binds = TIM1_BRK_TIM15,
        shared = [settings, rc, monitor, is_1hz],
        local = [controller, control_timer, encoder_timer, esc_timer, warning_led, diagnostics, ms_counter, in_tick],
        priority = 5
    )]
    fn control_tick(mut cx: control_tick::Context) {
        cx.local.control_timer.clear_interrupt(TimerInterrupt::Update);
        debug_assert!(!*cx.local.in_tick, "control_tick re-entered before completion");
        *cx.local.in_tick = true;
        *cx.local.ms_counter = cx.local.ms_counter.wrapping_add(20);

        let is_1hz = cx.shared.is_1hz.lock(|flag| core::mem::replace(flag, false));
        let clock = Clocks50Hz {
            ms: *cx.local.ms_counter,
            is_1hz,
        };
        let encoder = Encoder {
            timer: cx.local.encoder_timer,
        };

        let outcome = (cx.shared.settings, cx.shared.rc, cx.shared.monitor).lock(
            |settings, rc, monitor| {
                let outcome = cx.local.controller.tick(settings, &encoder, rc, &clock);
                *monitor = cx.local.controller.status.monitor;
                outcome
            },
        );

        let mut esc = EscPwm {
            timer: cx.local.esc_timer,
            channel: stm32_hal2::timer::TimChannel::C1,
        };
        esc.write(outcome.pwm);

        cx.local
            .warning_led
            .set_warning(cx.local.controller.status.monitor.warning_led_on());

        for event in outcome.events.iter() {
            cx.local.diagnostics.emit(event, is_1hz);
        }

        *cx.local.in_tick = false;
    }

    /// Bound to a 1 Hz hardware timer. Only flushes any diagnostic that was
    /// coalesced away at 50 Hz, so the same condition is still surfaced at
    /// least once a second; never touches the control path directly.
    #[task(
        binds = TIM1_UP_TIM16,
        shared = [monitor, is_1hz],
        local = [slow_timer, diagnostics],
        priority = 1
    )]
    fn slow_tick(mut cx: slow_tick::Context) {
        cx.local.slow_timer.clear_interrupt(TimerInterrupt::Update);
        cx.shared.is_1hz.lock(|flag| *flag = true);
        let monitor = cx.shared.monitor.lock(|m| *m);
        if monitor != Monitor::Free {
            cx.local.diagnostics.last = None;
        }
    }
}
