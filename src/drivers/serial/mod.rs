//! Driver de porta serial (UART NS16550, QEMU virt)
//!
//! Acesso MMIO através de `VolatilePtr` para impedir que o compilador
//! elida ou reordene os acessos aos registradores.

use core::fmt;
use core::ptr::NonNull;

use volatile::VolatilePtr;

use crate::sync::Spinlock;

/// Base MMIO do UART0 na máquina QEMU virt.
const UART0_BASE: usize = 0x1000_0000;

// Offsets dos registradores (DLAB = 0)
const THR: usize = 0; // Transmitter Holding (escrita)
const IER: usize = 1; // Interrupt Enable
const FCR: usize = 2; // FIFO Control
const LCR: usize = 3; // Line Control
const MCR: usize = 4; // Modem Control
const LSR: usize = 5; // Line Status

const LSR_TX_IDLE: u8 = 1 << 5;

/// Estado da serial
static SERIAL: Spinlock<SerialPort> = Spinlock::new(SerialPort::new(UART0_BASE));

struct SerialPort {
    base: usize,
    initialized: bool,
}

impl SerialPort {
    const fn new(base: usize) -> Self {
        Self {
            base,
            initialized: false,
        }
    }

    /// Ponteiro volátil para um registrador do UART.
    fn reg(&self, offset: usize) -> VolatilePtr<'_, u8> {
        // SAFETY: base + offset cai dentro da janela MMIO do UART0,
        // mapeada identidade pelo firmware.
        unsafe { VolatilePtr::new(NonNull::new_unchecked((self.base + offset) as *mut u8)) }
    }

    fn init(&mut self) {
        if self.initialized {
            return;
        }

        // Desabilitar interrupções do UART
        self.reg(IER).write(0x00);
        // Habilitar DLAB (set baud rate)
        self.reg(LCR).write(0x80);
        // Divisor low byte (38400 baud no clock do virt)
        self.reg(THR).write(0x03);
        // Divisor high byte
        self.reg(IER).write(0x00);
        // 8 bits, sem paridade, 1 stop bit
        self.reg(LCR).write(0x03);
        // Habilitar e limpar FIFOs
        self.reg(FCR).write(0xC7);
        // RTS/DTR
        self.reg(MCR).write(0x0B);

        self.initialized = true;
    }

    fn write_byte(&self, byte: u8) {
        // Esperar o transmissor esvaziar
        while self.reg(LSR).read() & LSR_TX_IDLE == 0 {
            core::hint::spin_loop();
        }
        self.reg(THR).write(byte);
    }
}

impl fmt::Write for SerialPort {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
        Ok(())
    }
}

/// Inicializa a serial explicitamente. A escrita também inicializa sob
/// demanda, para que logs muito cedo no boot não se percam.
pub fn init() {
    SERIAL.lock().init();
}

/// Escreve uma string.
pub fn write_str(s: &str) {
    use fmt::Write;
    let mut serial = SERIAL.lock();
    serial.init();
    let _ = serial.write_str(s);
}

/// Escreve argumentos formatados (uma linha de log inteira por lock,
/// para que linhas de núcleos/contextos diferentes não se intercalem).
pub fn write_fmt(args: fmt::Arguments) {
    use fmt::Write;
    let mut serial = SERIAL.lock();
    serial.init();
    let _ = serial.write_fmt(args);
}
