use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chipvm::{Chip8, DISPLAY_HEIGHT, DISPLAY_WIDTH};
use log::{error, info};
use sdl2::audio::{AudioCallback, AudioDevice, AudioSpecDesired};
use sdl2::event::Event;
use sdl2::keyboard::Keycode;
use sdl2::pixels::{Color, PixelFormatEnum};
use sdl2::{AudioSubsystem, Sdl, VideoSubsystem};

const TIMER_HZ: u32 = 60;
const TONE_HZ: f32 = 440.0;
const TONE_VOLUME: f32 = 0.1;
/// How far the loop may fall behind before it stops trying to catch up.
const MAX_LAG: Duration = Duration::from_millis(100);

/// Host settings, built from the command line.
#[derive(Debug, Clone)]
pub struct Config {
    pub rom: PathBuf,
    pub scale: u32,
    pub ips: u32,
    pub mute: bool,
}

enum Action {
    Continue,
    Reload,
    Quit,
}

struct SquareWave {
    phase_inc: f32,
    phase: f32,
    volume: f32,
}

impl AudioCallback for SquareWave {
    type Channel = f32;

    fn callback(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = if self.phase <= 0.5 {
                self.volume
            } else {
                -self.volume
            };
            self.phase = (self.phase + self.phase_inc) % 1.0;
        }
    }
}

/// Window, keyboard and speaker around a [`Chip8`].
pub struct Platform {
    context: Sdl,
    video: VideoSubsystem,
    tone: Option<AudioDevice<SquareWave>>,

    chip8: Chip8,
    config: Config,
}

impl Platform {
    pub fn new(chip8: Chip8, config: Config) -> Result<Self> {
        let context = sdl2::init()
            .map_err(anyhow::Error::msg)
            .context("failed to initialize SDL2")?;
        let video = context
            .video()
            .map_err(anyhow::Error::msg)
            .context("failed to initialize video subsystem")?;

        let tone = if config.mute {
            None
        } else {
            let audio = context
                .audio()
                .map_err(anyhow::Error::msg)
                .context("failed to initialize audio subsystem")?;
            Some(open_tone(&audio)?)
        };

        Ok(Self {
            context,
            video,
            tone,
            chip8,
            config,
        })
    }

    /// Runs until the window is closed. Returns an error if the program
    /// faults.
    pub fn run(&mut self) -> Result<()> {
        let window = self
            .video
            .window(
                "chipvm",
                DISPLAY_WIDTH as u32 * self.config.scale,
                DISPLAY_HEIGHT as u32 * self.config.scale,
            )
            .position_centered()
            .build()
            .context("failed to create window")?;

        let mut canvas = window
            .into_canvas()
            .build()
            .context("failed to create canvas")?;

        canvas.set_draw_color(Color::RGB(0, 0, 0));
        canvas.clear();
        canvas.present();

        // RGB332 keeps one byte per pixel, so 0xFF is white and the framebuffer
        // can be uploaded unchanged.
        let texture_creator = canvas.texture_creator();
        let mut texture = texture_creator
            .create_texture_streaming(
                PixelFormatEnum::RGB332,
                DISPLAY_WIDTH as u32,
                DISPLAY_HEIGHT as u32,
            )
            .context("failed to create texture")?;

        let mut event_pump = self
            .context
            .event_pump()
            .map_err(anyhow::Error::msg)
            .context("failed to get event pump")?;

        let cycle_period = Duration::from_secs(1) / self.config.ips;
        let timer_period = Duration::from_secs(1) / TIMER_HZ;

        let mut next_cycle = Instant::now();
        let mut next_tick = next_cycle;

        'running: loop {
            for event in event_pump.poll_iter() {
                match self.process_input(event) {
                    Action::Quit => break 'running,
                    Action::Reload => {
                        self.reload()?;
                        next_cycle = Instant::now();
                        next_tick = next_cycle;
                    }
                    Action::Continue => {}
                }
            }

            let now = Instant::now();
            if now.saturating_duration_since(next_cycle) > MAX_LAG {
                next_cycle = now;
            }
            if now.saturating_duration_since(next_tick) > MAX_LAG {
                next_tick = now;
            }

            while next_cycle <= now {
                if let Err(err) = self.chip8.cycle() {
                    error!("halting: {}", err);
                    self.set_tone(false);
                    return Err(err).context("program faulted");
                }
                next_cycle += cycle_period;
            }

            while next_tick <= now {
                let status = self.chip8.tick_timers();
                self.set_tone(status.sound);
                next_tick += timer_period;
            }

            if self.chip8.take_display_changed() {
                texture
                    .update(None, self.chip8.display(), DISPLAY_WIDTH)
                    .context("failed to update texture")?;
                canvas
                    .copy(&texture, None, None)
                    .map_err(anyhow::Error::msg)?;
                canvas.present();
            }

            let wake = next_cycle.min(next_tick);
            std::thread::sleep(wake.saturating_duration_since(Instant::now()));
        }

        self.set_tone(false);
        Ok(())
    }

    fn reload(&mut self) -> Result<()> {
        info!("reloading {}", self.config.rom.display());
        self.set_tone(false);
        self.chip8
            .load_rom_file(&self.config.rom)
            .context("failed to reload ROM")
    }

    fn set_tone(&self, on: bool) {
        if let Some(tone) = &self.tone {
            if on {
                tone.resume();
            } else {
                tone.pause();
            }
        }
    }

    fn process_input(&mut self, event: Event) -> Action {
        match event {
            Event::Quit { .. }
            | Event::KeyDown {
                keycode: Some(Keycode::Escape),
                ..
            } => Action::Quit,
            Event::KeyDown {
                keycode: Some(Keycode::F5),
                repeat: false,
                ..
            } => Action::Reload,
            Event::KeyDown {
                keycode: Some(keycode),
                ..
            } => {
                if let Some(key) = keymap(keycode) {
                    self.chip8.press_key(key);
                }
                Action::Continue
            }
            Event::KeyUp {
                keycode: Some(keycode),
                ..
            } => {
                if let Some(key) = keymap(keycode) {
                    self.chip8.release_key(key);
                }
                Action::Continue
            }

            // Ignore all other events.
            _ => Action::Continue,
        }
    }
}

fn open_tone(audio: &AudioSubsystem) -> Result<AudioDevice<SquareWave>> {
    let desired = AudioSpecDesired {
        freq: Some(44_100),
        channels: Some(1),
        samples: None,
    };

    audio
        .open_playback(None, &desired, |spec| SquareWave {
            phase_inc: TONE_HZ / spec.freq as f32,
            phase: 0.0,
            volume: TONE_VOLUME,
        })
        .map_err(anyhow::Error::msg)
        .context("failed to open audio device")
}

/// Maps the left four columns of a QWERTY keyboard onto the hex keypad.
///
/// ```text
/// 1 2 3 4 -> 1 2 3 C
/// Q W E R -> 4 5 6 D
/// A S D F -> 7 8 9 E
/// Z X C V -> A 0 B F
/// ```
fn keymap(keycode: Keycode) -> Option<u8> {
    match keycode {
        Keycode::Num1 => Some(0x1),
        Keycode::Num2 => Some(0x2),
        Keycode::Num3 => Some(0x3),
        Keycode::Num4 => Some(0xC),
        Keycode::Q => Some(0x4),
        Keycode::W => Some(0x5),
        Keycode::E => Some(0x6),
        Keycode::R => Some(0xD),
        Keycode::A => Some(0x7),
        Keycode::S => Some(0x8),
        Keycode::D => Some(0x9),
        Keycode::F => Some(0xE),
        Keycode::Z => Some(0xA),
        Keycode::X => Some(0x0),
        Keycode::C => Some(0xB),
        Keycode::V => Some(0xF),
        _ => None,
    }
}
