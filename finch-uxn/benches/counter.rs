use criterion::{Criterion, criterion_group, criterion_main};
use finch_uxn::Uxn;

/// Counts from 0 to 255 with INC / DUP / EQU and a JCI + JMP2 loop
const COUNTER: [u8; 15] = [
    0x80, 0x00, 0x01, 0x06, 0x80, 0xff, 0x08, 0x20, 0x00, 0x07, 0xa0, 0x00,
    0x02, 0x2c, 0x00,
];

pub fn counter(c: &mut Criterion) {
    c.bench_function("counter", |b| {
        b.iter(|| {
            let mut vm = Uxn::default();
            vm.run(std::hint::black_box(&COUNTER)).unwrap();
            vm.stack().len()
        })
    });
}

criterion_group!(benches, counter);
criterion_main!(benches);
