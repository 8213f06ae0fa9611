use core::panic::PanicInfo;

use defmt::{Display2Format, error};

use crate::status;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    match status::last_mode() {
        Some(mode) => error!("PANIC in {}: {}", mode.label(), Display2Format(info)),
        None => error!("PANIC before first iteration: {}", Display2Format(info)),
    }
    cortex_m::asm::udf();
}
