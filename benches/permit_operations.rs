// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use condlock::{CancellationToken, Cond};
use criterion::{Criterion, black_box};

pub fn bench_permit_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("permit_operations");
    let cond = Cond::new();
    let token = CancellationToken::new();

    group.bench_function("acquire_release", |b| {
        b.iter(|| {
            let mut ticket = cond.acquire(black_box(&token)).unwrap();
            ticket.release();
        })
    });

    group.bench_function("try_acquire_release", |b| {
        b.iter(|| {
            if let Some(mut ticket) = cond.try_acquire() {
                ticket.release();
            }
        })
    });

    let held = cond.acquire(&token).unwrap();
    group.bench_function("try_acquire_contended", |b| {
        b.iter(|| black_box(cond.try_acquire().is_none()))
    });
    drop(held);

    let deadline = CancellationToken::with_timeout(std::time::Duration::from_secs(3600));
    group.bench_function("acquire_release_with_deadline", |b| {
        b.iter(|| {
            let mut ticket = cond.acquire(black_box(&deadline)).unwrap();
            ticket.release();
        })
    });

    group.finish();
}
