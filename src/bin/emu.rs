use std::{path::PathBuf, sync::Arc, time::Instant};

use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use pixels::{Pixels, SurfaceTexture};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, KeyCode, NamedKey, PhysicalKey},
    window::{Window, WindowId},
};

use chip8_machine::{
    DEFAULT_SPEED, DISPLAY_X, DISPLAY_Y, Machine, PIXEL_ON, Runner, RunnerConfig,
};

/// Speed change per `=` / `-` press, in instructions per second.
const SPEED_STEP: f64 = 100.0;

const COLOR_ON: [u8; 4] = [0x00, 0x00, 0x00, 0xFF];
const COLOR_OFF: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];

/// Mapping from physical keyboard keys to CHIP-8 hex keypad (0x0-0xF).
const KEY_MAP: [KeyCode; 16] = [
    KeyCode::KeyX,   // 0x00
    KeyCode::Digit1, // 0x01
    KeyCode::Digit2, // 0x02
    KeyCode::Digit3, // 0x03
    KeyCode::KeyQ,   // 0x04
    KeyCode::KeyW,   // 0x05
    KeyCode::KeyE,   // 0x06
    KeyCode::KeyA,   // 0x07
    KeyCode::KeyS,   // 0x08
    KeyCode::KeyD,   // 0x09
    KeyCode::KeyZ,   // 0x0A
    KeyCode::KeyC,   // 0x0B
    KeyCode::Digit4, // 0x0C
    KeyCode::KeyR,   // 0x0D
    KeyCode::KeyF,   // 0x0E
    KeyCode::KeyV,   // 0x0F
];

struct App {
    pixels: Option<Pixels<'static>>,
    window: Option<Arc<Window>>,
    scale: u32,

    runner: Runner,
    /// Set when the pixel buffer must be refilled even if the machine drew nothing.
    needs_repaint: bool,
    /// Kept so Backspace can reload the program after a reset.
    rom: Vec<u8>,
    /// Used for delta time calculation.
    last_frame_instant: Instant,

    /// Stores the result of the application to be returned from main.
    exit_result: anyhow::Result<()>,
}

impl App {
    fn new(args: &Args, rom: Vec<u8>) -> anyhow::Result<Self> {
        let machine = match args.seed {
            Some(seed) => Machine::with_seed(seed),
            None => Machine::new(),
        };

        let mut runner = Runner::new(machine, RunnerConfig::with_speed(args.speed));
        runner
            .load_rom(&rom)
            .context("Failed to load ROM into CHIP-8 memory")?;

        Ok(Self {
            pixels: None,
            window: None,
            scale: args.scale.max(1),

            runner,
            needs_repaint: true,
            rom,
            last_frame_instant: Instant::now(),
            exit_result: Ok(()),
        })
    }

    fn process_display(&mut self) -> anyhow::Result<()> {
        let pixels = self.pixels.as_mut().context("Pixels surface not created")?;
        let framebuffer = self.runner.machine().framebuffer();

        for (pxl, &cell) in pixels.frame_mut().chunks_exact_mut(4).zip(framebuffer) {
            let rgba = if cell == PIXEL_ON { COLOR_ON } else { COLOR_OFF };
            pxl.copy_from_slice(&rgba);
        }
        Ok(())
    }

    fn handle_hotkey(&mut self, key: KeyCode) -> anyhow::Result<()> {
        match key {
            KeyCode::Space => {
                if self.runner.is_paused() {
                    self.runner.resume();
                    info!("Resumed");
                } else {
                    self.runner.pause();
                    info!("Paused");
                }
            }
            KeyCode::Equal => self.runner.set_speed(self.runner.speed() + SPEED_STEP),
            KeyCode::Minus => self.runner.set_speed(self.runner.speed() - SPEED_STEP),
            KeyCode::Backspace => {
                self.runner
                    .load_rom(&self.rom)
                    .context("Failed to reload ROM")?;
                self.needs_repaint = true;
            }
            _ => {}
        }
        Ok(())
    }

    fn try_resumed(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window = {
            let size = LogicalSize::new(
                DISPLAY_X as u32 * self.scale,
                DISPLAY_Y as u32 * self.scale,
            );
            let min_size = LogicalSize::new(DISPLAY_X as u32, DISPLAY_Y as u32);

            Arc::new(
                event_loop
                    .create_window(
                        Window::default_attributes()
                            .with_title("chip8-machine")
                            .with_inner_size(size)
                            .with_min_inner_size(min_size),
                    )
                    .context("Failed to create window")?,
            )
        };

        self.window = Some(window.clone());
        self.pixels = {
            let window_size = window.inner_size();
            let surface_texture =
                SurfaceTexture::new(window_size.width, window_size.height, window.clone());

            let pixels = Pixels::new(DISPLAY_X as u32, DISPLAY_Y as u32, surface_texture)
                .context("Failed to create pixels surface")?;

            window.request_redraw();
            Some(pixels)
        };

        // Avoid large dt on first frame
        self.last_frame_instant = Instant::now();
        self.needs_repaint = true;
        Ok(())
    }

    fn try_window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        event: WindowEvent,
    ) -> anyhow::Result<()> {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        ..
                    },
                ..
            } => {
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if let Some(pixels) = self.pixels.as_mut() {
                    pixels
                        .resize_surface(size.width, size.height)
                        .context("Failed to resize pixels surface")?;
                }
            }

            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = (now - self.last_frame_instant).as_secs_f64();
                self.last_frame_instant = now;

                let status = self.runner.update(dt).context("CHIP-8 execution error")?;

                // The pixel buffer keeps its contents between frames
                if status.display_updated || self.needs_repaint {
                    self.process_display()?;
                    self.needs_repaint = false;
                }

                if let Some(pixels) = self.pixels.as_ref() {
                    pixels.render().context("Pixels render error")?;
                }
                if let Some(window) = self.window.as_ref() {
                    window.request_redraw();
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return Ok(());
                };
                let pressed = event.state == ElementState::Pressed;

                if let Some(key) = KEY_MAP.iter().position(|&k| k == code) {
                    self.runner
                        .set_key(key as u8, pressed)
                        .context("Keypad update failed")?;
                } else if pressed && !event.repeat {
                    self.handle_hotkey(code)?;
                }
            }

            _ => (),
        }
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(e) = self.try_resumed(event_loop) {
            self.exit_result = Err(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Err(e) = self.try_window_event(event_loop, event) {
            warn!("Stopping: {e:#}");
            self.exit_result = Err(e);
            event_loop.exit();
        }
    }
}

/// CHIP-8 interpreter.
///
/// Keys 1-4, Q-R, A-F, Z-V map to the CHIP-8 keypad.
/// Space pauses, = and - change speed, Backspace restarts the ROM, Escape exits.
#[derive(Parser, Debug)]
#[command(about)]
struct Args {
    /// Path to the CHIP-8 ROM file
    rom_path: PathBuf,

    /// Instructions per second (clamped to 200-5000)
    #[arg(short, long, default_value_t = DEFAULT_SPEED)]
    speed: f64,

    /// Seed for the random number instruction, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Window scale factor
    #[arg(long, default_value_t = 10)]
    scale: u32,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let rom = std::fs::read(&args.rom_path)
        .with_context(|| format!("Failed to read ROM file {}", args.rom_path.display()))?;

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(&args, rom).context("Failed to initialize application")?;
    event_loop
        .run_app(&mut app)
        .context("Error occurred during event loop execution")?;

    // Return the result captured during the event loop
    app.exit_result
}
