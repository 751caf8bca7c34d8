//! Random laptop records for demos, tests and benchmarks.

use std::time::SystemTime;

use rand::Rng;
use rand::seq::SliceRandom;
use uuid::Uuid;

use crate::proto::{
    Cpu, Gpu, Keyboard, Laptop, Memory, Screen, Storage, keyboard, laptop, memory::Unit, screen,
    storage,
};

fn pick<R: Rng + ?Sized>(rng: &mut R, choices: &[&'static str]) -> String {
    choices.choose(rng).copied().unwrap_or_default().to_string()
}

/// A random keyboard.
pub fn new_keyboard<R: Rng + ?Sized>(rng: &mut R) -> Keyboard {
    let layout = match rng.gen_range(0..3) {
        0 => keyboard::Layout::Qwerty,
        1 => keyboard::Layout::Qwertz,
        _ => keyboard::Layout::Azerty,
    };

    Keyboard {
        layout: layout as i32,
        backlit: rng.gen(),
    }
}

/// A random CPU with 2 to 8 cores.
pub fn new_cpu<R: Rng + ?Sized>(rng: &mut R) -> Cpu {
    let brand = pick(rng, &["Intel", "AMD"]);
    let name = if brand == "Intel" {
        pick(rng, &["Core i3", "Core i5", "Core i7", "Core i9"])
    } else {
        pick(rng, &["Ryzen 3", "Ryzen 5", "Ryzen 7"])
    };
    let number_cores = rng.gen_range(2..=8);
    let min_ghz = rng.gen_range(2.0..3.5);

    Cpu {
        brand,
        name,
        number_cores,
        number_threads: rng.gen_range(number_cores..=12),
        min_ghz,
        max_ghz: rng.gen_range(min_ghz..5.0),
    }
}

/// A random GPU.
pub fn new_gpu<R: Rng + ?Sized>(rng: &mut R) -> Gpu {
    let brand = pick(rng, &["NVIDIA", "AMD"]);
    let name = if brand == "NVIDIA" {
        pick(rng, &["RTX 4060", "RTX 4070", "RTX 4080"])
    } else {
        pick(rng, &["RX 7600", "RX 7700"])
    };
    let min_ghz = rng.gen_range(1.0..1.5);

    Gpu {
        brand,
        name,
        min_ghz,
        max_ghz: rng.gen_range(min_ghz..2.0),
        memory: Some(Memory::new(rng.gen_range(2..=6), Unit::Gigabyte)),
    }
}

/// Random RAM between 4 and 64 GB.
pub fn new_ram<R: Rng + ?Sized>(rng: &mut R) -> Memory {
    Memory::new(rng.gen_range(4..=64), Unit::Gigabyte)
}

/// A random SSD.
pub fn new_ssd<R: Rng + ?Sized>(rng: &mut R) -> Storage {
    Storage {
        driver: storage::Driver::Ssd as i32,
        memory: Some(Memory::new(rng.gen_range(128..=1024), Unit::Gigabyte)),
    }
}

/// A random HDD.
pub fn new_hdd<R: Rng + ?Sized>(rng: &mut R) -> Storage {
    Storage {
        driver: storage::Driver::Hdd as i32,
        memory: Some(Memory::new(rng.gen_range(1..=6), Unit::Terabyte)),
    }
}

/// A random 16:9 screen.
pub fn new_screen<R: Rng + ?Sized>(rng: &mut R) -> Screen {
    let height = rng.gen_range(1080..=4320);
    let panel = if rng.gen() {
        screen::Panel::Ips
    } else {
        screen::Panel::Oled
    };

    Screen {
        size_inch: rng.gen_range(13.0..17.0),
        resolution: Some(screen::Resolution {
            width: height * 16 / 9,
            height,
        }),
        panel: panel as i32,
        multitouch: rng.gen(),
    }
}

/// A random laptop with a fresh identifier.
pub fn new_laptop<R: Rng + ?Sized>(rng: &mut R) -> Laptop {
    let brand = pick(rng, &["Apple", "Dell", "Lenovo"]);
    let name = match brand.as_str() {
        "Apple" => pick(rng, &["Macbook Air", "Macbook Pro"]),
        "Dell" => pick(rng, &["Latitude", "Vostro", "XPS", "Alienware"]),
        _ => pick(rng, &["Thinkpad X1", "Thinkpad P1", "Thinkpad P53"]),
    };

    Laptop {
        id: Uuid::new_v4().to_string(),
        brand,
        name,
        cpu: Some(new_cpu(rng)),
        ram: Some(new_ram(rng)),
        gpus: vec![new_gpu(rng)],
        storages: vec![new_ssd(rng), new_hdd(rng)],
        screen: Some(new_screen(rng)),
        keyboard: Some(new_keyboard(rng)),
        weight: Some(laptop::Weight::WeightKg(rng.gen_range(1.0..3.0))),
        price_usd: rng.gen_range(1500.0..3500.0),
        release_year: rng.gen_range(2015..=2024),
        updated_at: Some(SystemTime::now().into()),
    }
}

/// A random rating score between 1 and 10.
pub fn random_score<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    f64::from(rng.gen_range(1..=10))
}
