//! Fila de envio single-flight
//!
//! O canal do WhatsApp só aguenta um envio por vez: a sessão é única e frágil.
//! Esta fila serializa os jobs de envio:
//! - Ordem FIFO estrita (ordem de submissão = ordem de execução)
//! - No máximo UM corpo de job executando em qualquer instante
//! - `enqueue` nunca bloqueia: devolve um `JobHandle` que resolve quando o job termina
//! - Falha (ou pânico) de um job fica restrita ao handle daquele job
//!
//! Sem retry, sem timeout e sem cancelamento por parte da fila. Um job que nunca
//! termina trava todo o backlog atrás dele; use [`deadline`] dentro do corpo do job.
//!
//! Exemplo:
//! ```text
//! J1 (50ms) -> J2 (10ms) -> J3 (0ms)
//!         enqueue x3 -> worker executa J1, depois J2, depois J3
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot;

/// Erros observados pelo chamador de `enqueue`
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// O corpo do job entrou em pânico; a fila seguiu para o próximo
    #[error("send job panicked")]
    JobPanicked,

    /// O worker foi derrubado antes de executar o job (runtime encerrado)
    #[error("send queue worker stopped before the job completed")]
    WorkerGone,
}

/// O job excedeu o tempo limite definido pelo próprio corpo do job
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("job exceeded its deadline of {0:?}")]
pub struct DeadlineElapsed(pub Duration);

/// Snapshot da fila (para /health)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Jobs aguardando no backlog (não inclui o job em execução)
    pub pending: usize,
    /// Existe um worker drenando o backlog agora
    pub draining: bool,
    /// Jobs concluídos desde o início do processo (sucesso, erro ou pânico)
    pub processed: u64,
}

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

struct QueuedJob {
    id: u64,
    run: Job,
}

#[derive(Default)]
struct QueueState {
    backlog: VecDeque<QueuedJob>,
    draining: bool,
}

#[derive(Default)]
struct Inner {
    state: Mutex<QueueState>,
    processed: AtomicU64,
    next_id: AtomicU64,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        // Nenhum código entra em pânico segurando o lock; um lock envenenado ainda é consistente
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Fila FIFO com um único worker lógico
///
/// `Clone` é barato (compartilha o mesmo estado). Crie uma instância na raiz de
/// composição e passe-a explicitamente para quem precisa enfileirar envios.
#[derive(Clone, Default)]
pub struct SendQueue {
    inner: Arc<Inner>,
}

impl SendQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enfileira um job e devolve imediatamente o handle do resultado
    ///
    /// O handle resolve com a saída do job (tipicamente o próprio `Result` do
    /// envio) exatamente quando o job termina. Soltar o handle NÃO cancela o job.
    ///
    /// # Panics
    ///
    /// Precisa ser chamado de dentro de um runtime Tokio (o worker é uma task).
    pub fn enqueue<F, Fut, T>(&self, job: F) -> JobHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();

        let run: Job = Box::new(move || {
            async move {
                // A chamada de `job()` acontece dentro do poll, então pânicos síncronos também são capturados
                let outcome = AssertUnwindSafe(async move { job().await })
                    .catch_unwind()
                    .await;

                let result = match outcome {
                    Ok(output) => Ok(output),
                    Err(_) => {
                        tracing::error!("💥 Job #{} entrou em pânico; seguindo para o próximo", id);
                        Err(QueueError::JobPanicked)
                    }
                };

                if tx.send(result).is_err() {
                    tracing::debug!("Job #{} concluído, mas o chamador já descartou o handle", id);
                }
            }
            .boxed()
        });

        let start_worker = {
            let mut state = self.inner.lock_state();
            state.backlog.push_back(QueuedJob { id, run });

            tracing::debug!("📥 Job #{} enfileirado ({} no backlog)", id, state.backlog.len());

            if state.draining {
                false
            } else {
                state.draining = true;
                true
            }
        };

        if start_worker {
            tokio::spawn(drain(Arc::clone(&self.inner)));
        }

        JobHandle { id, rx }
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.inner.lock_state();
        QueueStats {
            pending: state.backlog.len(),
            draining: state.draining,
            processed: self.inner.processed.load(Ordering::Relaxed),
        }
    }
}

/// Loop do worker: consome a cabeça do backlog até esvaziá-lo
async fn drain(inner: Arc<Inner>) {
    tracing::debug!("▶️ Worker da fila iniciado");

    loop {
        let next = {
            let mut state = inner.lock_state();
            match state.backlog.pop_front() {
                Some(job) => job,
                None => {
                    // Mesmo lock que observou o backlog vazio: um enqueue concorrente verá draining=false
                    state.draining = false;
                    break;
                }
            }
        };

        tracing::debug!("🚚 Executando job #{}", next.id);
        (next.run)().await;
        inner.processed.fetch_add(1, Ordering::Relaxed);
    }

    tracing::debug!("⏹️ Backlog vazio, worker encerrado");
}

/// Resultado pendente de um job enfileirado
#[derive(Debug)]
pub struct JobHandle<T> {
    id: u64,
    rx: oneshot::Receiver<Result<T, QueueError>>,
}

impl<T> JobHandle<T> {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T> Future for JobHandle<T> {
    type Output = Result<T, QueueError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(QueueError::WorkerGone)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Limita a duração de um corpo de job
///
/// A fila não impõe timeout; jobs que falam com a rede devem se proteger com
/// isto. Ao estourar o prazo o future interno é descartado.
pub async fn deadline<F>(limit: Duration, future: F) -> Result<F::Output, DeadlineElapsed>
where
    F: Future,
{
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| DeadlineElapsed(limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    #[tokio::test(start_paused = true)]
    async fn test_fifo_start_order_ignores_durations() {
        let queue = SendQueue::new();
        let starts = Arc::new(Mutex::new(Vec::new()));
        let jobs = [("J1", 50u64), ("J2", 10), ("J3", 0)];

        let handles: Vec<_> = jobs
            .iter()
            .map(|&(name, ms)| {
                let starts = Arc::clone(&starts);
                queue.enqueue(move || async move {
                    starts.lock().unwrap().push(name);
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    name
                })
            })
            .collect();

        for (handle, (name, _)) in handles.into_iter().zip(jobs) {
            assert_eq!(handle.await.unwrap(), name);
        }

        assert_eq!(*starts.lock().unwrap(), vec!["J1", "J2", "J3"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_flight_under_concurrent_callers() {
        let queue = SendQueue::new();
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let mut callers = Vec::new();
        for i in 0..100u64 {
            let queue = queue.clone();
            let active = Arc::clone(&active);
            let max_active = Arc::clone(&max_active);

            callers.push(tokio::spawn(async move {
                let pause_ms = rand::thread_rng().gen_range(0..3u64);
                queue
                    .enqueue(move || async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        max_active.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(pause_ms)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                        i
                    })
                    .await
            }));
        }

        for (i, caller) in callers.into_iter().enumerate() {
            assert_eq!(caller.await.unwrap().unwrap(), i as u64);
        }

        assert_eq!(max_active.load(Ordering::SeqCst), 1, "dois jobs nunca podem se sobrepor");
        assert_eq!(queue.stats().processed, 100);
    }

    #[tokio::test]
    async fn test_failure_is_local_to_its_handle() {
        let queue = SendQueue::new();

        let j1 = queue.enqueue(|| async { Ok::<_, String>("j1") });
        let j2 = queue.enqueue(|| async { Err::<&str, _>("sessão desconectada".to_string()) });
        let j3 = queue.enqueue(|| async { Ok::<_, String>("j3") });

        assert_eq!(j1.await, Ok(Ok("j1")));
        assert_eq!(j2.await, Ok(Err("sessão desconectada".to_string())));
        assert_eq!(j3.await, Ok(Ok("j3")));
    }

    #[tokio::test]
    async fn test_panicking_job_does_not_stop_the_worker() {
        let queue = SendQueue::new();

        let boom = queue.enqueue(|| async {
            if true {
                panic!("boom");
            }
            1u32
        });
        let after = queue.enqueue(|| async { 2u32 });

        assert_eq!(boom.await, Err(QueueError::JobPanicked));
        assert_eq!(after.await, Ok(2));
    }

    #[tokio::test]
    async fn test_dropped_handle_still_runs_job() {
        let queue = SendQueue::new();
        let ran = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&ran);
        drop(queue.enqueue(move || async move {
            flag.store(true, Ordering::SeqCst);
        }));

        queue.enqueue(|| async {}).await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_worker_restarts_after_backlog_empties() {
        let queue = SendQueue::new();

        assert_eq!(queue.enqueue(|| async { "primeiro" }).await.unwrap(), "primeiro");
        tokio::task::yield_now().await;

        let stats = queue.stats();
        assert!(!stats.draining);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.processed, 1);

        assert_eq!(queue.enqueue(|| async { "segundo" }).await.unwrap(), "segundo");
        assert_eq!(queue.stats().processed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_report_backlog_while_draining() {
        let queue = SendQueue::new();

        let slow = queue.enqueue(|| tokio::time::sleep(Duration::from_secs(1)));
        let quick = queue.enqueue(|| async {});
        tokio::task::yield_now().await;

        let stats = queue.stats();
        assert!(stats.draining);
        assert_eq!(stats.pending, 1);

        slow.await.unwrap();
        quick.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_unblocks_backlog() {
        let queue = SendQueue::new();
        let limit = Duration::from_millis(100);

        let hung = queue.enqueue(move || deadline(limit, std::future::pending::<()>()));
        let next = queue.enqueue(|| async { "entregue" });

        assert_eq!(hung.await.unwrap(), Err(DeadlineElapsed(limit)));
        assert_eq!(next.await.unwrap(), "entregue");
    }

    #[test]
    fn test_handle_ids_are_sequential() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let queue = SendQueue::new();
            let a = queue.enqueue(|| async {});
            let b = queue.enqueue(|| async {});
            assert_eq!(b.id(), a.id() + 1);
            a.await.unwrap();
            b.await.unwrap();
        });
    }
}
