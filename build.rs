use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_BOOTLOADER_ADDRESS: u32 = 0x1800;
const PAGE_SIZE: u32 = 64;
const WRITE_SLEEP_MS: u32 = 8;
const DEFAULT_AUTO_EXIT_MS: u32 = 5000;
const RAMEND: u32 = 0x025F;

fn parse_number(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

fn env_number(name: &str, default: u32) -> u32 {
    println!("cargo:rerun-if-env-changed={}", name);
    match env::var(name) {
        Ok(raw) => parse_number(&raw)
            .unwrap_or_else(|| panic!("{} is not a number: {:?}", name, raw)),
        Err(_) => default,
    }
}

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let target = env::var("TARGET").unwrap();

    let bootloader_address = env_number("TINYLOADER_BOOTLOADER_ADDRESS", DEFAULT_BOOTLOADER_ADDRESS);
    let auto_exit_ms = env_number("TINYLOADER_AUTO_EXIT_MS", DEFAULT_AUTO_EXIT_MS);

    if bootloader_address % PAGE_SIZE != 0 {
        panic!(
            "bootloader address 0x{:04x} must be aligned to the {} byte flash page",
            bootloader_address, PAGE_SIZE
        );
    }
    if bootloader_address > 0xFFFF || auto_exit_ms > 0xFFFF {
        panic!("bootloader address and auto-exit timeout must fit in 16 bits");
    }

    if env::var("CARGO_FEATURE_AUTO_EXIT").is_ok() {
        let erase_ms = WRITE_SLEEP_MS * (bootloader_address / PAGE_SIZE);
        if auto_exit_ms < erase_ms {
            println!(
                "cargo:warning=auto-exit timeout {} ms is shorter than a full erase ({} ms)",
                auto_exit_ms, erase_ms
            );
        }
    }

    let layout = format!(
        "pub const BOOTLOADER_ADDRESS: u16 = 0x{:04x};\npub const AUTO_EXIT_MS: u16 = {};\n",
        bootloader_address, auto_exit_ms
    );
    fs::write(out_dir.join("layout.rs"), layout).unwrap();

    if target.contains("avr") {
        println!("cargo:rustc-link-arg=-mmcu=attiny85");
        println!("cargo:rustc-link-arg=-Wl,--section-start=.text=0x{:04x}", bootloader_address);
        // The two bytes at RAMEND hold the session marker.
        println!("cargo:rustc-link-arg=-Wl,--defsym=__stack=0x{:04x}", RAMEND - 2);

        // The V-USB driver is an external collaborator; build it when its sources are present.
        println!("cargo:rerun-if-env-changed=TINYLOADER_USBDRV");
        let usbdrv = env::var("TINYLOADER_USBDRV").unwrap_or_else(|_| "usbdrv".into());
        let usbdrv = Path::new(&usbdrv);
        if usbdrv.join("usbdrvasm.S").exists() {
            // The interrupt wrapper enters the driver at its sync detection.
            let driver_asm = out_dir.join("usbdrvasm_export.S");
            fs::write(&driver_asm, "#include \"usbdrvasm.S\"\n.global waitForJ\n").unwrap();

            cc::Build::new()
                .compiler("avr-gcc")
                .flag("-mmcu=attiny85")
                .define("F_CPU", "16500000UL")
                .include(usbdrv)
                .include(".")
                .file(usbdrv.join("usbdrv.c"))
                .file(driver_asm)
                .compile("usbdrv");
        } else {
            println!("cargo:warning=V-USB sources not found in {}", usbdrv.display());
        }
    }
}
