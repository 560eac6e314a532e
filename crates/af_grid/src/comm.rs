// crates/af_grid/src/comm.rs

//! 进程间交换抽象
//!
//! 块间交换本质上是每条连接一对双向通道：同进程时退化为直接
//! 内存交换，跨进程时序列化为连续缓冲并做成对 send/recv。
//! [`Comm`] 把后者抽象出来；[`SingleComm`] 是单进程退化实现，
//! [`ThreadComm`] 用 `std::sync::mpsc` 通道网格把多个"进程"
//! 映射为线程，保持与消息传递语义一致的成对标签收发。
//!
//! # 顺序保证
//!
//! 点对点消息按 (对端, 标签) 匹配，错序到达的消息暂存于本地
//! 待取队列。集合操作（广播、归约）用独立的标签空间与单调
//! 计数器，要求所有 rank 以相同次序调用。

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver, Sender};

use af_foundation::{AfError, AfResult};

/// 集合操作标签空间偏移
const COLLECTIVE_BASE: u64 = 1 << 32;

/// 消息载荷
#[derive(Debug, Clone)]
pub enum Payload {
    /// f64 数据
    F64(Vec<f64>),
    /// 字节数据（序列化的连接表等）
    Bytes(Vec<u8>),
}

impl Payload {
    fn into_f64(self) -> AfResult<Vec<f64>> {
        match self {
            Payload::F64(v) => Ok(v),
            Payload::Bytes(_) => Err(AfError::internal("载荷类型不匹配: 期望 f64")),
        }
    }

    fn into_bytes(self) -> AfResult<Vec<u8>> {
        match self {
            Payload::Bytes(v) => Ok(v),
            Payload::F64(_) => Err(AfError::internal("载荷类型不匹配: 期望字节")),
        }
    }
}

/// 进程间通信接口
pub trait Comm: Send {
    /// 本进程号
    fn rank(&self) -> usize;

    /// 进程总数
    fn size(&self) -> usize;

    /// 发送 f64 数据
    fn send(&self, peer: usize, tag: u64, data: &[f64]) -> AfResult<()>;

    /// 接收 f64 数据
    fn recv(&self, peer: usize, tag: u64) -> AfResult<Vec<f64>>;

    /// 发送字节数据
    fn send_bytes(&self, peer: usize, tag: u64, data: &[u8]) -> AfResult<()>;

    /// 接收字节数据
    fn recv_bytes(&self, peer: usize, tag: u64) -> AfResult<Vec<u8>>;

    /// 成对发送并接收（通道无界，先发后收不会死锁）
    fn sendrecv(
        &self,
        peer: usize,
        send_tag: u64,
        recv_tag: u64,
        data: &[f64],
    ) -> AfResult<Vec<f64>> {
        self.send(peer, send_tag, data)?;
        self.recv(peer, recv_tag)
    }

    /// 根进程广播字节数据，返回各进程收到的副本
    fn broadcast_bytes(&self, root: usize, data: Vec<u8>) -> AfResult<Vec<u8>>;

    /// 全归约求和（逐元素）
    fn all_reduce_sum(&self, vals: &mut [f64]) -> AfResult<()>;

    /// 全归约取最大（逐元素）
    fn all_reduce_max(&self, vals: &mut [f64]) -> AfResult<()>;
}

// ============================================================
// 单进程退化实现
// ============================================================

/// 单进程通信：点对点仅允许自环，集合操作为恒等
#[derive(Debug, Default)]
pub struct SingleComm {
    loopback: RefCell<VecDeque<(u64, Payload)>>,
}

impl SingleComm {
    /// 创建
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, tag: u64, payload: Payload) {
        self.loopback.borrow_mut().push_back((tag, payload));
    }

    fn pop(&self, tag: u64) -> AfResult<Payload> {
        let mut q = self.loopback.borrow_mut();
        if let Some(pos) = q.iter().position(|(t, _)| *t == tag) {
            Ok(q.remove(pos).expect("位置有效").1)
        } else {
            Err(AfError::internal(format!("自环队列中无标签 {}", tag)))
        }
    }
}

impl Comm for SingleComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn send(&self, peer: usize, tag: u64, data: &[f64]) -> AfResult<()> {
        debug_assert_eq!(peer, 0);
        self.push(tag, Payload::F64(data.to_vec()));
        Ok(())
    }

    fn recv(&self, _peer: usize, tag: u64) -> AfResult<Vec<f64>> {
        self.pop(tag)?.into_f64()
    }

    fn send_bytes(&self, peer: usize, tag: u64, data: &[u8]) -> AfResult<()> {
        debug_assert_eq!(peer, 0);
        self.push(tag, Payload::Bytes(data.to_vec()));
        Ok(())
    }

    fn recv_bytes(&self, _peer: usize, tag: u64) -> AfResult<Vec<u8>> {
        self.pop(tag)?.into_bytes()
    }

    fn broadcast_bytes(&self, _root: usize, data: Vec<u8>) -> AfResult<Vec<u8>> {
        Ok(data)
    }

    fn all_reduce_sum(&self, _vals: &mut [f64]) -> AfResult<()> {
        Ok(())
    }

    fn all_reduce_max(&self, _vals: &mut [f64]) -> AfResult<()> {
        Ok(())
    }
}

// ============================================================
// 线程网格实现
// ============================================================

struct Envelope {
    from: usize,
    tag: u64,
    payload: Payload,
}

/// 线程网格通信：每个 rank 一份，经 mpsc 通道互联
pub struct ThreadComm {
    rank: usize,
    size: usize,
    senders: Vec<Sender<Envelope>>,
    inbox: Receiver<Envelope>,
    pending: RefCell<Vec<Envelope>>,
    collective_seq: RefCell<u64>,
}

impl ThreadComm {
    /// 创建 n 个互联的通信端点，按 rank 顺序返回
    pub fn mesh(n: usize) -> Vec<ThreadComm> {
        let mut senders = Vec::with_capacity(n);
        let mut inboxes = Vec::with_capacity(n);
        for _ in 0..n {
            let (tx, rx) = channel();
            senders.push(tx);
            inboxes.push(rx);
        }
        inboxes
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| ThreadComm {
                rank,
                size: n,
                senders: senders.clone(),
                inbox,
                pending: RefCell::new(Vec::new()),
                collective_seq: RefCell::new(0),
            })
            .collect()
    }

    fn post(&self, peer: usize, tag: u64, payload: Payload) -> AfResult<()> {
        self.senders[peer].send(Envelope {
            from: self.rank,
            tag,
            payload,
        })?;
        Ok(())
    }

    fn take(&self, peer: usize, tag: u64) -> AfResult<Payload> {
        // 先查暂存
        {
            let mut pending = self.pending.borrow_mut();
            if let Some(pos) = pending
                .iter()
                .position(|e| e.from == peer && e.tag == tag)
            {
                return Ok(pending.remove(pos).payload);
            }
        }
        // 阻塞收取，错序的暂存
        loop {
            let env = self.inbox.recv()?;
            if env.from == peer && env.tag == tag {
                return Ok(env.payload);
            }
            self.pending.borrow_mut().push(env);
        }
    }

    fn next_collective_tag(&self) -> u64 {
        let mut seq = self.collective_seq.borrow_mut();
        *seq += 1;
        COLLECTIVE_BASE + *seq
    }

    fn reduce_with(&self, vals: &mut [f64], op: impl Fn(f64, f64) -> f64) -> AfResult<()> {
        let tag = self.next_collective_tag();
        if self.rank == 0 {
            for peer in 1..self.size {
                let theirs = self.take(peer, tag)?.into_f64()?;
                AfError::check_size("reduce", vals.len(), theirs.len())?;
                for (v, t) in vals.iter_mut().zip(theirs) {
                    *v = op(*v, t);
                }
            }
            for peer in 1..self.size {
                self.post(peer, tag + 1, Payload::F64(vals.to_vec()))?;
            }
        } else {
            self.post(0, tag, Payload::F64(vals.to_vec()))?;
            let result = self.take(0, tag + 1)?.into_f64()?;
            vals.copy_from_slice(&result);
        }
        // 归约占用两个标签
        *self.collective_seq.borrow_mut() += 1;
        Ok(())
    }
}

impl Comm for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, peer: usize, tag: u64, data: &[f64]) -> AfResult<()> {
        self.post(peer, tag, Payload::F64(data.to_vec()))
    }

    fn recv(&self, peer: usize, tag: u64) -> AfResult<Vec<f64>> {
        self.take(peer, tag)?.into_f64()
    }

    fn send_bytes(&self, peer: usize, tag: u64, data: &[u8]) -> AfResult<()> {
        self.post(peer, tag, Payload::Bytes(data.to_vec()))
    }

    fn recv_bytes(&self, peer: usize, tag: u64) -> AfResult<Vec<u8>> {
        self.take(peer, tag)?.into_bytes()
    }

    fn broadcast_bytes(&self, root: usize, data: Vec<u8>) -> AfResult<Vec<u8>> {
        let tag = self.next_collective_tag();
        if self.rank == root {
            for peer in 0..self.size {
                if peer != root {
                    self.post(peer, tag, Payload::Bytes(data.clone()))?;
                }
            }
            Ok(data)
        } else {
            self.take(root, tag)?.into_bytes()
        }
    }

    fn all_reduce_sum(&self, vals: &mut [f64]) -> AfResult<()> {
        self.reduce_with(vals, |a, b| a + b)
    }

    fn all_reduce_max(&self, vals: &mut [f64]) -> AfResult<()> {
        self.reduce_with(vals, f64::max)
    }
}
