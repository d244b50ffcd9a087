// src/rng.rs
//! Детерминированные генераторы случайных чисел
//!
//! Два семейства генераторов:
//! - `Pcg32` — основной быстрый генератор (PCG-XSH-RR, 64-битное состояние);
//! - `Alea` — legacy-генератор, засеваемый произвольной строкой (для совместимости
//!   с сидами, заданными извне).
//!
//! Оба реализуют `rand::RngCore`, поэтому весь остальной код работает через
//! стандартный интерфейс `rand::Rng`. Контракт детерминизма: один и тот же сид
//! даёт одну и ту же последовательность навсегда и на любой платформе.
//!
//! Дочерние потоки (`child`) выводятся из пары `(состояние, смещение)` и дают
//! независимую воспроизводимую последовательность для каждой ячейки — параллельные
//! проходы не зависят от порядка планирования.

use rand::{Error, RngCore, SeedableRng};

const PCG_MULT: u64 = 6_364_136_223_846_793_005;
const SPLITMIX_GOLDEN: u64 = 0x9e37_79b9_7f4a_7c15;

/// Перемешивание SplitMix64 — для инициализации состояния из произвольного u64.
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(SPLITMIX_GOLDEN);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Генератор PCG-XSH-RR: 64-битное состояние, 32-битный выход.
#[derive(Debug, Clone)]
pub struct Pcg32 {
    state: u64,
    inc: u64,
}

impl Pcg32 {
    /// Создаёт генератор из сида и номера потока.
    #[must_use]
    pub fn new(seed: u64, stream: u64) -> Self {
        let mut rng = Self {
            state: 0,
            inc: (stream << 1) | 1, // инкремент обязан быть нечётным
        };
        rng.step();
        rng.state = rng.state.wrapping_add(seed);
        rng.step();
        rng
    }

    fn step(&mut self) {
        self.state = self.state.wrapping_mul(PCG_MULT).wrapping_add(self.inc);
    }

    /// Выводит независимый дочерний поток из пары (состояние, смещение).
    ///
    /// Не продвигает родительский генератор: один и тот же `offset` у одного и
    /// того же родителя всегда даёт один и тот же поток.
    #[must_use]
    pub fn child(&self, offset: u64) -> Self {
        Self::new(
            splitmix64(self.state ^ splitmix64(offset)),
            offset.wrapping_add(1),
        )
    }
}

impl RngCore for Pcg32 {
    fn next_u32(&mut self) -> u32 {
        let old = self.state;
        self.step();
        // XSH-RR: xorshift старших битов + переменный поворот
        let xorshifted = (((old >> 18) ^ old) >> 27) as u32;
        let rot = (old >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    fn next_u64(&mut self) -> u64 {
        let hi = u64::from(self.next_u32());
        let lo = u64::from(self.next_u32());
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for Pcg32 {
    type Seed = [u8; 16];

    fn from_seed(seed: Self::Seed) -> Self {
        let state = u64::from_le_bytes(seed[..8].try_into().unwrap());
        let stream = u64::from_le_bytes(seed[8..].try_into().unwrap());
        Self::new(state, stream)
    }

    fn seed_from_u64(seed: u64) -> Self {
        Self::new(seed, 0)
    }
}

const MASH_N0: f64 = 4_022_871_197.0; // 0xefc8249d
const TWO_POW_32: f64 = 4_294_967_296.0;
const TWO_POW_NEG_32: f64 = 2.328_306_436_538_696_3e-10;

/// `x >>> 0` из исходной реализации: приведение к u32 с обрезанием дробной части.
fn to_u32_bits(x: f64) -> f64 {
    (x as u64 & 0xffff_ffff) as f64
}

/// Legacy-генератор Alea (аддитивный с запаздыванием и переносом).
///
/// Засевается произвольной строкой через хеш-функцию "mash"; три дробных
/// состояния s0..s2 и перенос c. Последовательность обязана побитово совпадать
/// с исторической реализацией — менять арифметику нельзя.
#[derive(Debug, Clone)]
pub struct Alea {
    s0: f64,
    s1: f64,
    s2: f64,
    c: f64,
}

impl Alea {
    #[must_use]
    pub fn new(seed: &str) -> Self {
        let mut mash_state = MASH_N0;
        let mut mash = |data: &str| -> f64 {
            let mut n = mash_state;
            for ch in data.chars() {
                n += f64::from(ch as u32);
                let mut h = 0.025_196_032_824_169_38 * n;
                n = to_u32_bits(h);
                h -= n;
                h *= n;
                n = to_u32_bits(h);
                h -= n;
                n += h * TWO_POW_32;
            }
            mash_state = n;
            to_u32_bits(n) * TWO_POW_NEG_32
        };

        let mut s0 = mash(" ");
        let mut s1 = mash(" ");
        let mut s2 = mash(" ");

        s0 -= mash(seed);
        if s0 < 0.0 {
            s0 += 1.0;
        }
        s1 -= mash(seed);
        if s1 < 0.0 {
            s1 += 1.0;
        }
        s2 -= mash(seed);
        if s2 < 0.0 {
            s2 += 1.0;
        }

        Self { s0, s1, s2, c: 1.0 }
    }

    /// Следующее дробное значение в [0, 1).
    pub fn next(&mut self) -> f64 {
        let t = 2_091_639.0 * self.s0 + self.c * TWO_POW_NEG_32;
        self.s0 = self.s1;
        self.s1 = self.s2;
        self.c = t.floor();
        self.s2 = t - self.c;
        self.s2
    }

    /// Сворачивает состояние в u64 — опора для дочерних Pcg32-потоков.
    #[must_use]
    pub fn state_digest(&self) -> u64 {
        let mut d = self.s0.to_bits();
        d = splitmix64(d ^ self.s1.to_bits());
        splitmix64(d ^ self.s2.to_bits())
    }
}

impl RngCore for Alea {
    fn next_u32(&mut self) -> u32 {
        (self.next() * TWO_POW_32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        let hi = u64::from(self.next_u32());
        let lo = u64::from(self.next_u32());
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Генератор запуска: либо Pcg32 от числового сида, либо Alea от строкового.
#[derive(Debug, Clone)]
pub enum MapRng {
    Pcg(Pcg32),
    Alea(Alea),
}

impl MapRng {
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self::Pcg(Pcg32::new(seed, 0))
    }

    #[must_use]
    pub fn from_string_seed(seed: &str) -> Self {
        Self::Alea(Alea::new(seed))
    }

    /// Дочерний поток для параллельной по-ячеечной работы.
    ///
    /// Для Alea основой служит свёртка текущего состояния: дочерние потоки
    /// всегда Pcg32, чтобы стоимость вывода не зависела от семейства родителя.
    #[must_use]
    pub fn child(&self, offset: u64) -> Pcg32 {
        match self {
            Self::Pcg(rng) => rng.child(offset),
            Self::Alea(rng) => Pcg32::new(splitmix64(rng.state_digest() ^ splitmix64(offset)), offset),
        }
    }
}

impl RngCore for MapRng {
    fn next_u32(&mut self) -> u32 {
        match self {
            Self::Pcg(rng) => rng.next_u32(),
            Self::Alea(rng) => rng.next_u32(),
        }
    }

    fn next_u64(&mut self) -> u64 {
        match self {
            Self::Pcg(rng) => rng.next_u64(),
            Self::Alea(rng) => rng.next_u64(),
        }
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        match self {
            Self::Pcg(rng) => rng.fill_bytes(dest),
            Self::Alea(rng) => rng.fill_bytes(dest),
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Целочисленные и дробные помощники поверх любого `RngCore`.
pub trait RandExt: RngCore {
    /// Равномерное целое в [0, bound) без modulo-смещения (rejection sampling).
    ///
    /// `bound == 0` возвращает 0; отрицательный `bound` — ошибка программиста.
    ///
    /// # Panics
    /// Паникует при `bound < 0`.
    fn next_int(&mut self, bound: i64) -> i64 {
        assert!(bound >= 0, "next_int: negative bound {bound}");
        if bound == 0 {
            return 0;
        }
        let bound = bound as u64;
        // Отбрасываем значения ниже порога, чтобы остаток делился на bound нацело
        let threshold = bound.wrapping_neg() % bound;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return (r % bound) as i64;
            }
        }
    }

    /// Равномерное целое в [lo, hi] — оба конца включительно.
    ///
    /// # Panics
    /// Паникует при `lo > hi`.
    fn next_int_range(&mut self, lo: i64, hi: i64) -> i64 {
        assert!(lo <= hi, "next_int_range: lo {lo} > hi {hi}");
        lo + self.next_int(hi - lo + 1)
    }

    /// Равномерное дробное в [0, 1) с 53 битами мантиссы.
    fn next_float(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }
}

impl<R: RngCore + ?Sized> RandExt for R {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcg_same_seed_same_sequence() {
        let mut a = Pcg32::new(42, 0);
        let mut b = Pcg32::new(42, 0);
        for _ in 0..1000 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn pcg_streams_differ() {
        let mut a = Pcg32::new(42, 0);
        let mut b = Pcg32::new(42, 1);
        let same = (0..64).filter(|_| a.next_u32() == b.next_u32()).count();
        assert!(same < 4);
    }

    #[test]
    fn next_int_zero_bound_returns_zero() {
        let mut rng = Pcg32::new(7, 0);
        assert_eq!(rng.next_int(0), 0);
    }

    #[test]
    #[should_panic(expected = "negative bound")]
    fn next_int_negative_bound_panics() {
        let mut rng = Pcg32::new(7, 0);
        let _ = rng.next_int(-5);
    }

    #[test]
    fn next_int_respects_bound() {
        let mut rng = Pcg32::new(99, 3);
        for _ in 0..10_000 {
            let v = rng.next_int(13);
            assert!((0..13).contains(&v));
        }
    }

    #[test]
    fn next_int_range_inclusive() {
        let mut rng = Pcg32::new(5, 0);
        let mut seen_lo = false;
        let mut seen_hi = false;
        for _ in 0..10_000 {
            let v = rng.next_int_range(-3, 3);
            assert!((-3..=3).contains(&v));
            seen_lo |= v == -3;
            seen_hi |= v == 3;
        }
        assert!(seen_lo && seen_hi);
    }

    #[test]
    fn next_float_in_unit_interval() {
        let mut rng = Pcg32::new(1, 0);
        for _ in 0..10_000 {
            let f = rng.next_float();
            assert!((0.0..1.0).contains(&f));
        }
    }

    #[test]
    fn alea_same_string_same_sequence() {
        let mut a = Alea::new("azgard");
        let mut b = Alea::new("azgard");
        for _ in 0..1000 {
            assert_eq!(a.next().to_bits(), b.next().to_bits());
        }
    }

    #[test]
    fn alea_different_strings_diverge() {
        let mut a = Alea::new("azgard");
        let mut b = Alea::new("azgarD");
        let first_a: Vec<u32> = (0..8).map(|_| a.next_u32()).collect();
        let first_b: Vec<u32> = (0..8).map(|_| b.next_u32()).collect();
        assert_ne!(first_a, first_b);
    }

    #[test]
    fn alea_output_in_unit_interval() {
        let mut rng = Alea::new("interval");
        for _ in 0..10_000 {
            let v = rng.next();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn child_streams_are_stable_and_independent() {
        let parent = Pcg32::new(1234, 0);
        let mut c1 = parent.child(17);
        let mut c1_again = parent.child(17);
        let mut c2 = parent.child(18);

        let seq1: Vec<u32> = (0..32).map(|_| c1.next_u32()).collect();
        let seq1_again: Vec<u32> = (0..32).map(|_| c1_again.next_u32()).collect();
        let seq2: Vec<u32> = (0..32).map(|_| c2.next_u32()).collect();

        assert_eq!(seq1, seq1_again);
        assert_ne!(seq1, seq2);
    }

    #[test]
    fn child_does_not_advance_parent() {
        let mut a = Pcg32::new(55, 0);
        let mut b = Pcg32::new(55, 0);
        let _ = b.child(3);
        assert_eq!(a.next_u32(), b.next_u32());
    }

    #[test]
    fn fill_bytes_deterministic() {
        let mut a = Pcg32::new(8, 0);
        let mut b = Pcg32::new(8, 0);
        let mut buf_a = [0u8; 33];
        let mut buf_b = [0u8; 33];
        a.fill_bytes(&mut buf_a);
        b.fill_bytes(&mut buf_b);
        assert_eq!(buf_a, buf_b);
    }
}
