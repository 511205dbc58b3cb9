// 声明模块结构：
// `application`: 启动逻辑（监控引擎 + HTTP 服务器）。
// `handlers`: WebSocket、状态、重新加载和指标接口。
// `state`: 共享状态定义。
mod application;
mod handlers;
mod state;


use std::io;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // 启动失败时打印到标准错误输出，并以非零状态码退出。
    if let Err(err) = application::run().await {
        eprintln!("[api] bootstrap failed: {err}");
        return Err(io::Error::other(err.to_string()));
    }

    Ok(())
}
