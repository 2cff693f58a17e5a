use criterion::{black_box, criterion_group, criterion_main, Criterion};
use thermal::pid::Pid;

fn benchmark_pid(c: &mut Criterion) {
    let mut pid: Pid<f32> = Pid::new(0.6, 0.1, 0.05, 200.0, 0.0, 1.0);
    let mut measured = 22.0f32;

    c.bench_function("pid_update_steady_state", |b| {
        b.iter(|| {
            let output = pid.update(black_box(measured), black_box(0.25));
            measured += output * 0.1;
            black_box(output)
        })
    });
}

criterion_group!(benches, benchmark_pid);
criterion_main!(benches);
