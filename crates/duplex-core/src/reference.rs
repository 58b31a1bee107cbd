//! Deterministic reference machine
//!
//! A small stand-in for a full CPU/PPU core. It does not execute real
//! instructions, but it has the properties the rollback engine depends on:
//!
//! - every tick is a pure function of the previous state, the cartridge and
//!   the link partner's byte on the wire
//! - button presses change the evolution (joypad register and interrupt)
//! - it talks to its partner over the serial link at a fixed rate
//! - its whole state round-trips through a [`Memento`]

use crate::button::ButtonEvent;
use crate::cartridge::{Cartridge, RAM_SIZE_ADDRESS, TITLE_END, TITLE_START};
use crate::joypad::{Joypad, P1_ADDRESS};
use crate::machine::{JoypadPressEvent, Machine};
use crate::memento::Memento;
use crate::rng::Xorshift;
use crate::serial::SerialEndpoint;
use crate::sink::SharedSink;
use crate::time::Tick;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Ticks between two serial transfers
pub const SERIAL_PERIOD: Tick = 512;

/// Size of work RAM
pub const WRAM_SIZE: usize = 0x100;

/// Entry point after the boot sequence
const ENTRY_POINT: u32 = 0x100;

/// Joypad interrupt vector
const JOYPAD_VECTOR: u32 = 0x60;

/// IF bit for the joypad interrupt
const JOYPAD_INTERRUPT: u8 = 0x10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct MachineState {
    ticks: Tick,
    pc: u32,
    a: u8,
    interrupt_flags: u8,
    joypad: Joypad,
    scrambler: Xorshift,
    wram: Vec<u8>,
    cart_ram: Vec<u8>,
}

/// Deterministic machine used by tests and demos
pub struct ReferenceMachine {
    cartridge: Cartridge,
    state: MachineState,
    events: Option<SharedSink<JoypadPressEvent>>,
    link: Option<SerialEndpoint>,
}

impl ReferenceMachine {
    /// Elapsed ticks since power-on
    pub fn ticks(&self) -> Tick {
        self.state.ticks
    }

    /// Accumulator
    pub fn accumulator(&self) -> u8 {
        self.state.a
    }

    /// Read the joypad register as the game would
    pub fn read_p1(&self) -> u8 {
        self.read(P1_ADDRESS)
    }

    /// Cartridge RAM contents
    pub fn cart_ram(&self) -> &[u8] {
        &self.state.cart_ram
    }

    /// Work RAM contents
    pub fn wram(&self) -> &[u8] {
        &self.state.wram
    }

    fn read(&self, address: u16) -> u8 {
        match address {
            P1_ADDRESS => self.state.joypad.read(),
            _ => {
                let rom = self.cartridge.rom();
                rom[usize::from(address) % rom.len()]
            }
        }
    }

    fn serial_exchange(&mut self) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        let incoming = link.transfer(self.state.a);
        let slot = (self.state.ticks / SERIAL_PERIOD) as usize % WRAM_SIZE;
        self.state.wram[slot] ^= incoming;
        self.state.a ^= incoming;
    }
}

impl Machine for ReferenceMachine {
    type Link = SerialEndpoint;

    fn from_cartridge(cartridge: &Cartridge) -> Result<Self> {
        let rom = cartridge.rom();
        // Seed from the header checksum area so different games diverge
        let seed = rom[0x134..0x150]
            .iter()
            .fold(0u64, |acc, b| acc.rotate_left(5) ^ u64::from(*b));

        log::debug!(
            "Powering on reference machine with '{}' ({} bytes ROM, {} bytes RAM)",
            cartridge.title(),
            rom.len(),
            cartridge.ram_size()
        );

        Ok(Self {
            cartridge: cartridge.clone(),
            state: MachineState {
                ticks: 0,
                pc: ENTRY_POINT,
                a: 0x01,
                interrupt_flags: 0,
                joypad: Joypad::new(),
                scrambler: Xorshift::new(seed),
                wram: vec![0; WRAM_SIZE],
                cart_ram: cartridge.initial_ram(),
            },
            events: None,
            link: None,
        })
    }

    fn init(&mut self, events: SharedSink<JoypadPressEvent>, link: SerialEndpoint) {
        self.events = Some(events);
        self.link = Some(link);
    }

    fn tick(&mut self) {
        if self.state.interrupt_flags & JOYPAD_INTERRUPT != 0 {
            self.state.interrupt_flags &= !JOYPAD_INTERRUPT;
            self.state.pc = JOYPAD_VECTOR;
            self.state.a = self.state.a.wrapping_add(0x40);
        }

        let rom_len = self.cartridge.rom().len();
        let opcode = self.cartridge.rom()[self.state.pc as usize % rom_len];

        // Poll the pad like a game does: alternate between the two lines
        let select = if self.state.ticks & 1 == 0 { 0x10 } else { 0x20 };
        self.state.joypad.write(select);
        let pad = self.state.joypad.read();

        let noise = self.state.scrambler.next_u8();
        self.state.a = self.state.a.rotate_left(1) ^ opcode ^ pad ^ noise;

        let wram_slot = usize::from(opcode) % WRAM_SIZE;
        self.state.wram[wram_slot] = self.state.wram[wram_slot].wrapping_add(self.state.a);

        if opcode & 0x0F == 0x0A && !self.state.cart_ram.is_empty() {
            let len = self.state.cart_ram.len();
            let slot = (self.state.pc as usize ^ usize::from(self.state.a)) % len;
            self.state.cart_ram[slot] = self.state.a;
        }

        let step = 1 + u32::from(opcode & 0x03);
        self.state.pc = (self.state.pc + step) % rom_len as u32;

        self.state.ticks += 1;
        if self.state.ticks % SERIAL_PERIOD == 0 {
            self.serial_exchange();
        }
    }

    fn button_event(&mut self, event: ButtonEvent) {
        if self.state.joypad.handle(event) {
            self.state.interrupt_flags |= JOYPAD_INTERRUPT;
        }
        if let ButtonEvent::Press(button) = event {
            if let Some(events) = &self.events {
                events.post(JoypadPressEvent {
                    button,
                    tick: self.state.ticks,
                });
            }
        }
    }

    fn save(&self) -> Result<Memento<Self>> {
        Memento::encode(&self.state)
    }

    fn restore(&mut self, memento: &Memento<Self>) -> Result<()> {
        let state: MachineState = memento.decode()?;
        if state.cart_ram.len() != self.state.cart_ram.len() || state.wram.len() != WRAM_SIZE {
            return Err(Error::Machine(format!(
                "state does not fit cartridge '{}': {} bytes cartridge RAM, expected {}",
                self.cartridge.title(),
                state.cart_ram.len(),
                self.state.cart_ram.len()
            )));
        }
        self.state = state;
        Ok(())
    }

    fn link(&self) -> Option<&SerialEndpoint> {
        self.link.as_ref()
    }

    fn link_mut(&mut self) -> Option<&mut SerialEndpoint> {
        self.link.as_mut()
    }
}

/// Build a synthetic 32 KiB ROM with a valid header
///
/// The body is filled with a fixed pseudo-random pattern so the reference
/// machine has varied opcodes to chew on. `ram_code` is the header's RAM
/// size byte (0x149).
pub fn synthetic_rom(title: &str, ram_code: u8) -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    for (i, b) in rom.iter_mut().enumerate() {
        *b = (i as u32).wrapping_mul(2_654_435_761).to_le_bytes()[3];
    }
    let title = title.as_bytes();
    let len = title.len().min(TITLE_END - TITLE_START);
    rom[TITLE_START..TITLE_END].fill(0);
    rom[TITLE_START..TITLE_START + len].copy_from_slice(&title[..len]);
    rom[RAM_SIZE_ADDRESS] = ram_code;
    rom
}

/// Shared empty sink for machines whose events nobody watches
pub fn null_events() -> SharedSink<JoypadPressEvent> {
    Arc::new(crate::sink::NullSink)
}
