//! rendezvous-core
//!
//! Core building blocks for the service appointment lifecycle engine.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, schedule, state, catalog, actor, events, errors）
//! - **ports**: 抽象化レイヤー（ScheduleStore, AuditLedger, Catalog/Subscription/Identity, Notifier, Clock）
//! - **gate**: 認可とサブスクリプションの判定
//! - **app**: アプリケーションロジック（builder, engine, transition, delivery, retry）
//! - **impls**: 実装（InMemoryScheduleStore など開発用）
//! - **config**: TOML 設定

pub mod app;
pub mod config;
pub mod domain;
pub mod gate;
pub mod impls;
pub mod ports;
