use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        loss::CrossEntropyLossConfig,
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::gelu,
};
use serde::{Deserialize, Serialize};

/// Number of output classes: 0 = not the gold knowledge, 1 = gold.
pub const NUM_LABELS: usize = 2;

// ─── Pretrained configuration ─────────────────────────────────────────────────
/// The subset of a hub `config.json` the encoder needs.
/// Missing keys fall back to the DeBERTa-v3-base values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PretrainedConfig {
    pub vocab_size:                   usize,
    pub hidden_size:                  usize,
    pub num_hidden_layers:            usize,
    pub num_attention_heads:          usize,
    pub intermediate_size:            usize,
    pub max_position_embeddings:      usize,
    pub hidden_dropout_prob:          f64,
    pub attention_probs_dropout_prob: f64,
    pub layer_norm_eps:               f64,
}

impl Default for PretrainedConfig {
    fn default() -> Self {
        Self {
            vocab_size:                   128_100,
            hidden_size:                  768,
            num_hidden_layers:            12,
            num_attention_heads:          12,
            intermediate_size:            3072,
            max_position_embeddings:      512,
            hidden_dropout_prob:          0.1,
            attention_probs_dropout_prob: 0.1,
            layer_norm_eps:               1e-7,
        }
    }
}

impl PretrainedConfig {
    pub fn classifier(&self) -> EncoderClassifierConfig {
        EncoderClassifierConfig::new(
            self.vocab_size,
            self.max_position_embeddings,
            self.hidden_size,
            self.num_attention_heads,
            self.num_hidden_layers,
            self.intermediate_size,
            self.hidden_dropout_prob,
            self.attention_probs_dropout_prob,
            self.layer_norm_eps,
        )
    }
}

// ─── Model configuration ──────────────────────────────────────────────────────
// #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct EncoderClassifierConfig {
    pub vocab_size:        usize,
    pub max_positions:     usize,
    pub d_model:           usize,
    pub num_heads:         usize,
    pub num_layers:        usize,
    pub d_ff:              usize,
    pub hidden_dropout:    f64,
    pub attention_dropout: f64,
    pub layer_norm_eps:    f64,
}

impl EncoderClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> EncoderClassifier<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_positions, self.d_model).init(device);
        let embedding_norm     = self.layer_norm(device);
        let layers: Vec<EncoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        let pooler     = LinearConfig::new(self.d_model, self.d_model).init(device);
        let classifier = LinearConfig::new(self.d_model, NUM_LABELS).init(device);
        let dropout    = DropoutConfig::new(self.hidden_dropout).init();
        EncoderClassifier {
            token_embedding, position_embedding, embedding_norm, layers,
            pooler, classifier, dropout,
        }
    }

    fn layer_norm<B: Backend>(&self, device: &B::Device) -> LayerNorm<B> {
        LayerNormConfig::new(self.d_model)
            .with_epsilon(self.layer_norm_eps)
            .init(device)
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn   = MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.attention_dropout)
            .init(device);
        let ffn_linear1 = LinearConfig::new(self.d_model, self.d_ff).init(device);
        let ffn_linear2 = LinearConfig::new(self.d_ff, self.d_model).init(device);
        let norm1   = self.layer_norm(device);
        let norm2   = self.layer_norm(device);
        let dropout = DropoutConfig::new(self.hidden_dropout).init();
        EncoderBlock { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }
}

// ─── Encoder block ────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// `mask_pad` is true at padding positions, which attention skips.
    pub fn forward(&self, x: Tensor<B, 3>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let input       = MhaInput::self_attn(x.clone()).mask_pad(mask_pad);
        let attn_output = self.self_attn.forward(input).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(gelu(self.ffn_linear1.forward(x.clone())));
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

// ─── Classifier ───────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct EncoderClassifier<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub embedding_norm:     LayerNorm<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub pooler:             Linear<B>,
    pub classifier:         Linear<B>,
    pub dropout:            Dropout,
}

impl<B: Backend> EncoderClassifier<B> {
    /// input_ids, attention_mask: [batch, seq_len] → logits: [batch, NUM_LABELS]
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let [batch_size, seq_len] = input_ids.dims();

        let tok_emb = self.token_embedding.forward(input_ids);
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &tok_emb.device())
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        let mut x = self.dropout.forward(self.embedding_norm.forward(tok_emb + pos_emb));
        let mask_pad = attention_mask.equal_elem(0);
        for layer in &self.layers {
            x = layer.forward(x, mask_pad.clone());
        }

        // Context pooler: the first token stands for the whole pair.
        let [_, _, d_model] = x.dims();
        let first = x
            .slice([0..batch_size, 0..1, 0..d_model])
            .reshape([batch_size, d_model]);
        let pooled = gelu(self.pooler.forward(self.dropout.forward(first)));

        self.classifier.forward(self.dropout.forward(pooled))
    }

    /// Cross-entropy loss against `labels` ([batch]) plus the logits.
    pub fn forward_loss(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
        labels:         Tensor<B, 1, Int>,
    ) -> (Tensor<B, 1>, Tensor<B, 2>) {
        let logits = self.forward(input_ids, attention_mask);
        let loss = CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits.clone(), labels);
        (loss, logits)
    }
}
